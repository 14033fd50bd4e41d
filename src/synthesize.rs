//! Placeholder comment creation and merging with existing docs.

use log::trace;

use crate::ast::{Comment, CommentGroup};
use crate::registry::{CommentGroupId, CommentRegistry};
use crate::token::Pos;

pub fn placeholder_text(name: &str) -> String {
    format!("// {name} needs a comment (THIS IS A PLACEHOLDER)")
}

fn placeholder(name: &str, slash: Pos) -> Comment {
    Comment {
        slash,
        text: placeholder_text(name),
        synthetic: true,
    }
}

/// Make sure a declaration's doc starts with `// <name>`.
///
/// A missing or empty doc becomes a new group holding only the placeholder,
/// one position before `attach`; the group is registered and its id
/// returned. A doc whose first line starts with `// <name>` is left alone.
/// Any other doc gets the placeholder prepended, one position before its
/// first comment.
pub fn ensure_doc(
    registry: &mut CommentRegistry,
    existing: Option<CommentGroupId>,
    name: &str,
    attach: Pos,
) -> Option<CommentGroupId> {
    let existing = existing.filter(|&id| !registry.get(id).is_empty());
    let Some(id) = existing else {
        trace!("adding placeholder for {name} at {attach}");
        let group = CommentGroup::new(vec![placeholder(name, attach - 1)]);
        return Some(registry.register(group));
    };

    let group = registry.get_mut(id);
    let first = &group.list[0];
    if first.text.starts_with(&format!("// {name}")) {
        return Some(id);
    }
    trace!("prepending placeholder for {name} to existing doc");
    let slash = first.slash - 1;
    group.list.insert(0, placeholder(name, slash));
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_doc_creates_group() {
        let mut registry = CommentRegistry::new();
        let id = ensure_doc(&mut registry, None, "Hello", Pos(40)).unwrap();
        let group = registry.get(id);
        assert_eq!(group.list.len(), 1);
        assert_eq!(group.list[0].slash, Pos(39));
        assert_eq!(
            group.list[0].text,
            "// Hello needs a comment (THIS IS A PLACEHOLDER)"
        );
        assert!(group.list[0].synthetic);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_doc_is_replaced() {
        let mut registry = CommentRegistry::new();
        let empty = registry.register(CommentGroup::default());
        let id = ensure_doc(&mut registry, Some(empty), "Hello", Pos(40)).unwrap();
        assert_ne!(id, empty);
        assert_eq!(registry.get(id).list.len(), 1);
    }

    #[test]
    fn matching_doc_untouched() {
        let mut registry = CommentRegistry::new();
        let doc = registry.register(CommentGroup::new(vec![Comment::new(
            Pos(10),
            "// Hello says hello.",
        )]));
        let id = ensure_doc(&mut registry, Some(doc), "Hello", Pos(40)).unwrap();
        assert_eq!(id, doc);
        assert_eq!(registry.get(doc).list.len(), 1);
    }

    #[test]
    fn prefix_match_is_literal() {
        let mut registry = CommentRegistry::new();
        let doc = registry.register(CommentGroup::new(vec![Comment::new(
            Pos(10),
            "// HelloWorld greets.",
        )]));
        ensure_doc(&mut registry, Some(doc), "Hello", Pos(40));
        assert_eq!(registry.get(doc).list.len(), 1);
    }

    #[test]
    fn mismatched_doc_gets_prefix() {
        let mut registry = CommentRegistry::new();
        let doc = registry.register(CommentGroup::new(vec![
            Comment::new(Pos(10), "// says hello."),
            Comment::new(Pos(25), "// twice."),
        ]));
        let id = ensure_doc(&mut registry, Some(doc), "Hello", Pos(40)).unwrap();
        assert_eq!(id, doc);
        let list = &registry.get(doc).list;
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].slash, Pos(9));
        assert!(list[0].synthetic);
        assert_eq!(list[1].text, "// says hello.");
    }

    #[test]
    fn case_sensitive() {
        let mut registry = CommentRegistry::new();
        let doc = registry.register(CommentGroup::new(vec![Comment::new(
            Pos(10),
            "// hello lowercase.",
        )]));
        ensure_doc(&mut registry, Some(doc), "Hello", Pos(40));
        assert_eq!(registry.get(doc).list.len(), 2);
    }
}
