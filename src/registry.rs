//! Per-file comment storage.
//!
//! Groups live in an append-only arena so declarations can refer to them by
//! id. A separate order vector is what the printer iterates; `reindex` must
//! run after groups are added out of position.

use crate::ast::{Comment, CommentGroup};
use crate::token::Pos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommentGroupId(u32);

impl CommentGroupId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommentRegistry {
    groups: Vec<CommentGroup>,
    order: Vec<CommentGroupId>,
}

impl CommentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group at the end of the order. The order is only sorted
    /// again by `reindex`.
    pub fn register(&mut self, group: CommentGroup) -> CommentGroupId {
        let id = CommentGroupId(self.groups.len() as u32);
        self.groups.push(group);
        self.order.push(id);
        id
    }

    pub fn get(&self, id: CommentGroupId) -> &CommentGroup {
        &self.groups[id.index()]
    }

    pub fn get_mut(&mut self, id: CommentGroupId) -> &mut CommentGroup {
        &mut self.groups[id.index()]
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Groups in their current order.
    pub fn iter(&self) -> impl Iterator<Item = (CommentGroupId, &CommentGroup)> + '_ {
        self.order.iter().map(|&id| (id, self.get(id)))
    }

    /// All comments in group order.
    pub fn comments(&self) -> impl Iterator<Item = &Comment> + '_ {
        self.iter().flat_map(|(_, group)| group.list.iter())
    }

    /// Stable sort of the order by each group's first comment position.
    pub fn reindex(&mut self) {
        let groups = &self.groups;
        self.order.sort_by_key(|id| groups[id.index()].pos());
    }

    #[cfg(test)]
    fn is_sorted(&self) -> bool {
        self.order
            .windows(2)
            .all(|w| self.get(w[0]).pos() <= self.get(w[1]).pos())
    }

    /// Start of the chain of comments that ends right before `pos`.
    ///
    /// A comment continues the chain when its end is exactly one position
    /// before the start of the comment (or `pos`) that follows it. Returns
    /// `pos` unchanged when nothing is adjacent.
    pub fn head(&self, pos: Pos) -> Pos {
        let mut comments: Vec<&Comment> = self.comments().collect();
        comments.sort_by_key(|c| c.slash);

        let mut current = pos;
        for comment in comments.iter().rev() {
            let end = comment.end();
            if end > current - 1 {
                continue;
            }
            if end == current - 1 {
                current = comment.slash;
            } else {
                break;
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(slash: u32, text: &str) -> CommentGroup {
        CommentGroup::new(vec![Comment::new(Pos(slash), text)])
    }

    #[test]
    fn register_appends() {
        let mut registry = CommentRegistry::new();
        let a = registry.register(group(20, "// a"));
        let b = registry.register(group(5, "// b"));
        let order: Vec<_> = registry.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, b]);
        assert!(!registry.is_sorted());
    }

    #[test]
    fn reindex_sorts_by_first_position() {
        let mut registry = CommentRegistry::new();
        let a = registry.register(group(20, "// a"));
        let b = registry.register(group(5, "// b"));
        let c = registry.register(group(12, "// c"));
        registry.reindex();
        let order: Vec<_> = registry.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![b, c, a]);
        assert!(registry.is_sorted());
    }

    #[test]
    fn reindex_is_stable() {
        let mut registry = CommentRegistry::new();
        let a = registry.register(group(7, "// a"));
        let b = registry.register(group(7, "// b"));
        registry.reindex();
        let order: Vec<_> = registry.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, b]);
    }

    #[test]
    fn reindex_on_empty_registry() {
        let mut registry = CommentRegistry::new();
        registry.reindex();
        assert!(registry.is_empty());
    }

    #[test]
    fn head_follows_adjacent_chain() {
        let mut registry = CommentRegistry::new();
        // "// a" covers 1..5, "// bb" starts right after at 6
        registry.register(group(1, "// a"));
        registry.register(group(6, "// bb"));
        // end of "// bb" is 11, so a node at 12 chains back to 1
        assert_eq!(registry.head(Pos(12)), Pos(1));
        assert_eq!(registry.head(Pos(7)), Pos(7));
    }

    #[test]
    fn head_without_neighbours() {
        let mut registry = CommentRegistry::new();
        registry.register(group(1, "// a"));
        assert_eq!(registry.head(Pos(40)), Pos(40));
    }
}
