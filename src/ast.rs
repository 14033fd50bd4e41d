//! Syntax tree for one Go source file.
//!
//! Only the parts of the tree that matter for documentation are modelled in
//! detail: declarations, their specs and the blocks that may hold nested
//! declarations. Types and expressions are kept as token ranges; the printer
//! works from the token stream, so nothing is lost.

use std::ops::Range;

use crate::layout::Layout;
use crate::registry::{CommentGroupId, CommentRegistry};
use crate::token::{LineTable, Pos, Token};

/// A single `//` or `/* */` comment. `text` includes the markers and no
/// trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub slash: Pos,
    pub text: String,
    /// Inserted by the rewriter rather than read from the source.
    pub synthetic: bool,
}

impl Comment {
    pub fn new(slash: Pos, text: impl Into<String>) -> Self {
        Self {
            slash,
            text: text.into(),
            synthetic: false,
        }
    }

    pub fn end(&self) -> Pos {
        self.slash.advance(self.text.len())
    }

    pub fn is_line(&self) -> bool {
        self.text.starts_with("//")
    }
}

/// Adjacent comments with no tokens between them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentGroup {
    pub list: Vec<Comment>,
}

impl CommentGroup {
    pub fn new(list: Vec<Comment>) -> Self {
        Self { list }
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Position of the first comment, or `Pos::NONE` for an empty group.
    pub fn pos(&self) -> Pos {
        self.list.first().map_or(Pos::NONE, |c| c.slash)
    }

    pub fn end(&self) -> Pos {
        self.list.last().map_or(Pos::NONE, Comment::end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub pos: Pos,
}

impl Ident {
    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }
}

/// Exported names start with an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct File {
    pub doc: Option<CommentGroupId>,
    pub package: Pos,
    pub name: Ident,
    pub decls: Vec<Decl>,
    pub comments: CommentRegistry,
    pub(crate) tokens: Vec<Token>,
    pub(crate) lines: LineTable,
    pub(crate) layout: Layout,
}

impl File {
    pub fn line(&self, pos: Pos) -> usize {
        self.lines.line(pos)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
    Func(FuncDecl),
    Gen(GenDecl),
}

impl Decl {
    pub fn pos(&self) -> Pos {
        match self {
            Decl::Func(f) => f.func_pos,
            Decl::Gen(g) => g.kw_pos,
        }
    }

    pub fn doc(&self) -> Option<CommentGroupId> {
        match self {
            Decl::Func(f) => f.doc,
            Decl::Gen(g) => g.doc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    pub doc: Option<CommentGroupId>,
    pub func_pos: Pos,
    /// Receiver parameter list, for methods.
    pub recv: Option<Expr>,
    pub name: Ident,
    pub body: Option<Block>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenDeclKind {
    Import,
    Const,
    Var,
    Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenDecl {
    pub doc: Option<CommentGroupId>,
    pub kind: GenDeclKind,
    pub kw_pos: Pos,
    pub l_paren: Option<Pos>,
    pub specs: Vec<Spec>,
    pub r_paren: Option<Pos>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Spec {
    Import(ImportSpec),
    Value(ValueSpec),
    Type(TypeSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    pub name: Option<Ident>,
    /// The quoted path as written.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSpec {
    pub names: Vec<Ident>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    pub name: Ident,
    pub type_params: Option<Expr>,
    pub alias: bool,
    pub ty: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub lbrace: Pos,
    pub stmts: Vec<Stmt>,
    pub rbrace: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `var`, `const` or `type` inside a function body.
    Decl(GenDecl),
    Block(Block),
    /// Any other statement, with the bodies of control clauses and function
    /// literals found inside it.
    Other(Expr),
}

/// A run of tokens that is not modelled further, plus the blocks nested in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub tokens: Range<usize>,
    pub bodies: Vec<Block>,
}
