//! Positions, token kinds and the operator table for Go source.

use std::fmt;
use std::ops::Sub;

use crate::error::SyntaxError;

/// A 1-based byte offset into a single source file. `Pos::NONE` is "no position".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pos(pub u32);

impl Pos {
    pub const NONE: Pos = Pos(0);

    pub fn from_offset(offset: usize) -> Pos {
        Pos(offset as u32 + 1)
    }

    pub fn offset(self) -> usize {
        (self.0 as usize).saturating_sub(1)
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// The position `len` bytes further on.
    pub fn advance(self, len: usize) -> Pos {
        Pos(self.0 + len as u32)
    }
}

impl Sub<u32> for Pos {
    type Output = Pos;

    fn sub(self, rhs: u32) -> Pos {
        Pos(self.0.saturating_sub(rhs))
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps positions to 1-based lines and columns.
#[derive(Debug, Clone, Default)]
pub struct LineTable {
    starts: Vec<usize>,
}

impl LineTable {
    pub fn new(src: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            src.bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    /// Line of `pos`, or 0 for `Pos::NONE`.
    pub fn line(&self, pos: Pos) -> usize {
        if !pos.is_valid() {
            return 0;
        }
        let offset = pos.offset();
        self.starts.partition_point(|&start| start <= offset)
    }

    pub fn position(&self, pos: Pos) -> (usize, usize) {
        let line = self.line(pos);
        if line == 0 {
            return (0, 0);
        }
        (line, pos.offset() - self.starts[line - 1] + 1)
    }

    pub fn error(&self, pos: Pos, message: impl Into<String>) -> SyntaxError {
        let (line, column) = self.position(pos);
        SyntaxError {
            line,
            column,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Break,
    Case,
    Chan,
    Const,
    Continue,
    Default,
    Defer,
    Else,
    Fallthrough,
    For,
    Func,
    Go,
    Goto,
    If,
    Import,
    Interface,
    Map,
    Package,
    Range,
    Return,
    Select,
    Struct,
    Switch,
    Type,
    Var,
}

impl Keyword {
    pub fn lookup(word: &str) -> Option<Keyword> {
        let kw = match word {
            "break" => Keyword::Break,
            "case" => Keyword::Case,
            "chan" => Keyword::Chan,
            "const" => Keyword::Const,
            "continue" => Keyword::Continue,
            "default" => Keyword::Default,
            "defer" => Keyword::Defer,
            "else" => Keyword::Else,
            "fallthrough" => Keyword::Fallthrough,
            "for" => Keyword::For,
            "func" => Keyword::Func,
            "go" => Keyword::Go,
            "goto" => Keyword::Goto,
            "if" => Keyword::If,
            "import" => Keyword::Import,
            "interface" => Keyword::Interface,
            "map" => Keyword::Map,
            "package" => Keyword::Package,
            "range" => Keyword::Range,
            "return" => Keyword::Return,
            "select" => Keyword::Select,
            "struct" => Keyword::Struct,
            "switch" => Keyword::Switch,
            "type" => Keyword::Type,
            "var" => Keyword::Var,
            _ => return None,
        };
        Some(kw)
    }

    /// Keywords after which a newline ends the statement.
    pub fn ends_statement(self) -> bool {
        matches!(
            self,
            Keyword::Break | Keyword::Continue | Keyword::Fallthrough | Keyword::Return
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Quo,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    AddAssign,
    SubAssign,
    MulAssign,
    QuoAssign,
    RemAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    AndNotAssign,
    LAnd,
    LOr,
    Arrow,
    Inc,
    Dec,
    Eql,
    Lss,
    Gtr,
    Assign,
    Not,
    Neq,
    Leq,
    Geq,
    Define,
    Ellipsis,
    LParen,
    LBrack,
    LBrace,
    Comma,
    Period,
    RParen,
    RBrack,
    RBrace,
    Colon,
    Tilde,
}

/// Operator spellings, longest first so the scanner can take the first match.
pub const OPERATORS: &[(&str, Op)] = &[
    ("<<=", Op::ShlAssign),
    (">>=", Op::ShrAssign),
    ("&^=", Op::AndNotAssign),
    ("...", Op::Ellipsis),
    ("+=", Op::AddAssign),
    ("-=", Op::SubAssign),
    ("*=", Op::MulAssign),
    ("/=", Op::QuoAssign),
    ("%=", Op::RemAssign),
    ("&=", Op::AndAssign),
    ("|=", Op::OrAssign),
    ("^=", Op::XorAssign),
    ("<<", Op::Shl),
    (">>", Op::Shr),
    ("&^", Op::AndNot),
    ("&&", Op::LAnd),
    ("||", Op::LOr),
    ("<-", Op::Arrow),
    ("++", Op::Inc),
    ("--", Op::Dec),
    ("==", Op::Eql),
    ("!=", Op::Neq),
    ("<=", Op::Leq),
    (">=", Op::Geq),
    (":=", Op::Define),
    ("+", Op::Add),
    ("-", Op::Sub),
    ("*", Op::Mul),
    ("/", Op::Quo),
    ("%", Op::Rem),
    ("&", Op::And),
    ("|", Op::Or),
    ("^", Op::Xor),
    ("<", Op::Lss),
    (">", Op::Gtr),
    ("=", Op::Assign),
    ("!", Op::Not),
    ("(", Op::LParen),
    ("[", Op::LBrack),
    ("{", Op::LBrace),
    (",", Op::Comma),
    (".", Op::Period),
    (")", Op::RParen),
    ("]", Op::RBrack),
    ("}", Op::RBrace),
    (":", Op::Colon),
    ("~", Op::Tilde),
];

impl Op {
    /// Binary precedence (5 binds tightest), or 0 for non-binary operators.
    pub fn precedence(self) -> u8 {
        match self {
            Op::LOr => 1,
            Op::LAnd => 2,
            Op::Eql | Op::Neq | Op::Lss | Op::Leq | Op::Gtr | Op::Geq => 3,
            Op::Add | Op::Sub | Op::Or | Op::Xor => 4,
            Op::Mul | Op::Quo | Op::Rem | Op::Shl | Op::Shr | Op::And | Op::AndNot => 5,
            _ => 0,
        }
    }

    pub fn is_assign(self) -> bool {
        matches!(
            self,
            Op::Assign
                | Op::Define
                | Op::AddAssign
                | Op::SubAssign
                | Op::MulAssign
                | Op::QuoAssign
                | Op::RemAssign
                | Op::AndAssign
                | Op::OrAssign
                | Op::XorAssign
                | Op::ShlAssign
                | Op::ShrAssign
                | Op::AndNotAssign
        )
    }

    /// Operators that may also appear in prefix position.
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Op::Add | Op::Sub | Op::Mul | Op::And | Op::Xor | Op::Not | Op::Arrow | Op::Tilde
        )
    }

    pub fn is_open(self) -> bool {
        matches!(self, Op::LParen | Op::LBrack | Op::LBrace)
    }

    pub fn is_close(self) -> bool {
        matches!(self, Op::RParen | Op::RBrack | Op::RBrace)
    }

    pub fn closing(self) -> Option<Op> {
        match self {
            Op::LParen => Some(Op::RParen),
            Op::LBrack => Some(Op::RBrack),
            Op::LBrace => Some(Op::RBrace),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Int,
    Float,
    Imag,
    Char,
    String,
    Keyword(Keyword),
    Op(Op),
    /// `implicit` semicolons come from a newline or the end of input.
    Semicolon { implicit: bool },
    Eof,
}

impl TokenKind {
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::Int | TokenKind::Float | TokenKind::Imag | TokenKind::Char | TokenKind::String
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    pub text: String,
}

impl Token {
    pub fn end(&self) -> Pos {
        self.pos.advance(self.text.len())
    }

    pub fn is_op(&self, op: Op) -> bool {
        self.kind == TokenKind::Op(op)
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.kind == TokenKind::Keyword(kw)
    }

    pub fn is_semicolon(&self) -> bool {
        matches!(self.kind, TokenKind::Semicolon { .. })
    }

    pub fn is_implicit_semicolon(&self) -> bool {
        self.kind == TokenKind::Semicolon { implicit: true }
    }

    /// True when the token can end an operand (identifier, literal, closer).
    pub fn ends_operand(&self) -> bool {
        match self.kind {
            TokenKind::Ident => true,
            kind if kind.is_literal() => true,
            TokenKind::Op(op) => matches!(op, Op::RParen | Op::RBrack | Op::RBrace),
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Semicolon { implicit: true } => "newline".to_string(),
            TokenKind::Eof => "EOF".to_string(),
            TokenKind::Ident => format!("identifier {}", self.text),
            kind if kind.is_literal() => format!("literal {}", self.text),
            _ => format!("'{}'", self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_table() {
        let src = "package a\n\nfunc F() {}\n";
        let lines = LineTable::new(src);
        assert_eq!(lines.line(Pos::from_offset(0)), 1);
        assert_eq!(lines.line(Pos::from_offset(9)), 1);
        assert_eq!(lines.line(Pos::from_offset(10)), 2);
        assert_eq!(lines.line(Pos::from_offset(11)), 3);
        assert_eq!(lines.position(Pos::from_offset(16)), (3, 6));
        assert_eq!(lines.line(Pos::NONE), 0);
    }

    #[test]
    fn pos_arithmetic() {
        let pos = Pos::from_offset(10);
        assert_eq!(pos.offset(), 10);
        assert_eq!((pos - 1).offset(), 9);
        assert_eq!(Pos(0) - 1, Pos::NONE);
        assert_eq!(pos.advance(3), Pos::from_offset(13));
    }

    #[test]
    fn operator_precedence() {
        assert_eq!(Op::LOr.precedence(), 1);
        assert_eq!(Op::Eql.precedence(), 3);
        assert_eq!(Op::Add.precedence(), 4);
        assert_eq!(Op::AndNot.precedence(), 5);
        assert_eq!(Op::Assign.precedence(), 0);
        assert!(Op::ShlAssign.is_assign());
    }

    #[test]
    fn operators_longest_first() {
        for (i, (text, _)) in OPERATORS.iter().enumerate() {
            for (later, _) in &OPERATORS[i + 1..] {
                assert!(
                    !later.starts_with(text) || later.len() <= text.len(),
                    "{later} must come before {text}"
                );
            }
        }
    }
}
