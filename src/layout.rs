//! Formatting hints the parser leaves for the printer, keyed by token index.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct Layout {
    /// `{` tokens that open statement blocks (function bodies, control
    /// clauses, bare blocks).
    pub block_braces: HashSet<usize>,
    /// `{` tokens that open struct or interface bodies.
    pub type_braces: HashSet<usize>,
    /// `[` tokens that open type parameter or type argument lists.
    pub type_brackets: HashSet<usize>,
    /// Operators used in prefix position inside types (`*T`, `<-chan T`, `~int`).
    pub prefix_ops: HashSet<usize>,
    /// Tokens that always get a blank before them (receivers, result lists,
    /// the type of a spec or field).
    pub spaced: HashSet<usize>,
    /// Explicit semicolons inside `if`/`for`/`switch` headers.
    pub header_semis: HashSet<usize>,
    /// `case`, `default` and labels, printed one level out.
    pub outdent: HashSet<usize>,
    /// Column breaks to emit before a token, for aligned sections.
    pub cells: HashMap<usize, usize>,
    /// Column breaks before a trailing comment that follows this token.
    pub comment_cells: HashMap<usize, usize>,
    /// First token of each spec in a parenthesized import, with its sort key.
    pub import_specs: HashMap<usize, String>,
}

impl Layout {
    pub fn add_cells(&mut self, token: usize, count: usize) {
        if count > 0 {
            *self.cells.entry(token).or_default() += count;
        }
    }
}
