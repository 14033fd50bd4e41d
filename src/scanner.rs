//! Go lexer.
//!
//! Produces the token stream (with automatic semicolons) and, separately, all
//! comments in source order. Implicit semicolons are zero-width and sit at the
//! newline or at the comment that ends the line.

use crate::ast::Comment;
use crate::error::SyntaxError;
use crate::token::{Keyword, LineTable, Op, Pos, Token, TokenKind, OPERATORS};

#[derive(Debug, Default)]
pub struct Scanned {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
}

pub fn scan(src: &str, lines: &LineTable) -> Result<Scanned, SyntaxError> {
    Scanner {
        src,
        bytes: src.as_bytes(),
        offset: 0,
        insert_semi: false,
        lines,
        out: Scanned::default(),
    }
    .run()
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    offset: usize,
    insert_semi: bool,
    lines: &'a LineTable,
    out: Scanned,
}

impl<'a> Scanner<'a> {
    fn run(mut self) -> Result<Scanned, SyntaxError> {
        if self.src.starts_with('\u{feff}') {
            self.offset = '\u{feff}'.len_utf8();
        }
        loop {
            self.skip_whitespace();
            let start = self.offset;
            let Some(&c) = self.bytes.get(start) else {
                if self.insert_semi {
                    self.push_implicit_semi(start);
                }
                self.push(TokenKind::Eof, start, start);
                break;
            };
            match c {
                // only reached while a semicolon is pending
                b'\n' => {
                    self.push_implicit_semi(start);
                    self.offset += 1;
                }
                b'/' if matches!(self.bytes.get(start + 1), Some(b'/' | b'*')) => {
                    if self.insert_semi && self.comment_ends_line(start) {
                        self.push_implicit_semi(start);
                        continue;
                    }
                    self.scan_comment(start)?;
                }
                b'"' => {
                    self.scan_string(start)?;
                    self.finish(TokenKind::String, start, true);
                }
                b'`' => {
                    self.scan_raw_string(start)?;
                    self.finish(TokenKind::String, start, true);
                }
                b'\'' => {
                    self.scan_rune(start)?;
                    self.finish(TokenKind::Char, start, true);
                }
                b'0'..=b'9' => {
                    let kind = self.scan_number(start);
                    self.finish(kind, start, true);
                }
                b'.' if self.bytes.get(start + 1).is_some_and(u8::is_ascii_digit) => {
                    let kind = self.scan_number(start);
                    self.finish(kind, start, true);
                }
                _ => {
                    let ch = self.src[start..].chars().next().unwrap_or('\0');
                    if is_letter(ch) {
                        self.scan_identifier(start);
                    } else {
                        self.scan_operator(start, ch)?;
                    }
                }
            }
        }
        Ok(self.out)
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.bytes.get(self.offset) {
            match c {
                b' ' | b'\t' | b'\r' => self.offset += 1,
                b'\n' if !self.insert_semi => self.offset += 1,
                _ => break,
            }
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.out.tokens.push(Token {
            kind,
            pos: Pos::from_offset(start),
            text: self.src[start..end].to_string(),
        });
    }

    fn push_implicit_semi(&mut self, at: usize) {
        self.out.tokens.push(Token {
            kind: TokenKind::Semicolon { implicit: true },
            pos: Pos::from_offset(at),
            text: String::new(),
        });
        self.insert_semi = false;
    }

    fn finish(&mut self, kind: TokenKind, start: usize, insert_semi: bool) {
        self.push(kind, start, self.offset);
        self.insert_semi = insert_semi;
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> SyntaxError {
        self.lines.error(Pos::from_offset(offset), message)
    }

    /// Whether the comments starting at `start` run to the end of the line
    /// with no token after them.
    fn comment_ends_line(&self, start: usize) -> bool {
        let mut i = start;
        loop {
            match self.bytes.get(i..i + 2) {
                Some(b"//") => return true,
                Some(b"/*") => {}
                _ => return false,
            }
            i += 2;
            loop {
                match self.bytes.get(i) {
                    None => return true,
                    Some(b'\n') => return true,
                    Some(b'*') if self.bytes.get(i + 1) == Some(&b'/') => {
                        i += 2;
                        break;
                    }
                    Some(_) => i += 1,
                }
            }
            while matches!(self.bytes.get(i), Some(b' ' | b'\t' | b'\r')) {
                i += 1;
            }
            match self.bytes.get(i) {
                None | Some(b'\n') => return true,
                Some(b'/') => {}
                Some(_) => return false,
            }
        }
    }

    fn scan_comment(&mut self, start: usize) -> Result<(), SyntaxError> {
        let text = if self.bytes[start + 1] == b'/' {
            let end = self.src[start..]
                .find('\n')
                .map_or(self.src.len(), |n| start + n);
            self.offset = end;
            self.src[start..end].trim_end_matches('\r').to_string()
        } else {
            let Some(n) = self.src[start + 2..].find("*/") else {
                return Err(self.error(start, "comment not terminated"));
            };
            self.offset = start + 2 + n + 2;
            self.src[start..self.offset].replace('\r', "")
        };
        self.out
            .comments
            .push(Comment::new(Pos::from_offset(start), text));
        Ok(())
    }

    fn scan_identifier(&mut self, start: usize) {
        let end = self.src[start..]
            .char_indices()
            .find(|&(_, ch)| !(is_letter(ch) || ch.is_numeric()))
            .map_or(self.src.len(), |(n, _)| start + n);
        self.offset = end;
        let word = &self.src[start..end];
        match Keyword::lookup(word) {
            Some(kw) => self.finish(TokenKind::Keyword(kw), start, kw.ends_statement()),
            None => self.finish(TokenKind::Ident, start, true),
        }
    }

    fn scan_number(&mut self, start: usize) -> TokenKind {
        let b = self.bytes;
        let mut kind = TokenKind::Int;
        let mut i = start;
        let hex = b[i] == b'0' && matches!(b.get(i + 1), Some(b'x' | b'X'));
        if hex || (b[i] == b'0' && matches!(b.get(i + 1), Some(b'b' | b'B' | b'o' | b'O'))) {
            i += 2;
        }
        while let Some(&c) = b.get(i) {
            if c.is_ascii_alphanumeric() || c == b'_' {
                let exponent = if hex {
                    matches!(c, b'p' | b'P')
                } else {
                    matches!(c, b'e' | b'E')
                };
                i += 1;
                if exponent {
                    kind = TokenKind::Float;
                    if matches!(b.get(i), Some(b'+' | b'-')) {
                        i += 1;
                    }
                }
            } else if c == b'.' && b.get(i + 1) != Some(&b'.') {
                kind = TokenKind::Float;
                i += 1;
            } else {
                break;
            }
        }
        if b[i - 1] == b'i' {
            kind = TokenKind::Imag;
        }
        self.offset = i;
        kind
    }

    fn scan_escaped(&mut self, start: usize, quote: u8, what: &str) -> Result<(), SyntaxError> {
        let mut i = start + 1;
        loop {
            match self.bytes.get(i) {
                None | Some(b'\n') => {
                    return Err(self.error(start, format!("{what} literal not terminated")))
                }
                Some(b'\\') => i += 2,
                Some(&c) if c == quote => {
                    self.offset = i + 1;
                    return Ok(());
                }
                Some(_) => i += 1,
            }
        }
    }

    fn scan_string(&mut self, start: usize) -> Result<(), SyntaxError> {
        self.scan_escaped(start, b'"', "string")
    }

    fn scan_rune(&mut self, start: usize) -> Result<(), SyntaxError> {
        self.scan_escaped(start, b'\'', "rune")
    }

    fn scan_raw_string(&mut self, start: usize) -> Result<(), SyntaxError> {
        match self.src[start + 1..].find('`') {
            Some(n) => {
                self.offset = start + 1 + n + 1;
                Ok(())
            }
            None => Err(self.error(start, "raw string literal not terminated")),
        }
    }

    fn scan_operator(&mut self, start: usize, ch: char) -> Result<(), SyntaxError> {
        let rest = &self.src[start..];
        if rest.starts_with(';') {
            self.offset = start + 1;
            self.finish(TokenKind::Semicolon { implicit: false }, start, false);
            return Ok(());
        }
        let Some(&(text, op)) = OPERATORS.iter().find(|(text, _)| rest.starts_with(text)) else {
            return Err(self.error(
                start,
                format!("invalid character U+{:04X} '{ch}'", ch as u32),
            ));
        };
        self.offset = start + text.len();
        let insert = matches!(op, Op::RParen | Op::RBrack | Op::RBrace | Op::Inc | Op::Dec);
        self.finish(TokenKind::Op(op), start, insert);
        Ok(())
    }
}

fn is_letter(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let lines = LineTable::new(src);
        scan(src, &lines)
            .unwrap()
            .tokens
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    const SEMI: TokenKind = TokenKind::Semicolon { implicit: true };

    #[test]
    fn semicolon_insertion() {
        assert_eq!(
            kinds("x := 1\nreturn\n"),
            vec![
                TokenKind::Ident,
                TokenKind::Op(Op::Define),
                TokenKind::Int,
                SEMI,
                TokenKind::Keyword(Keyword::Return),
                SEMI,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn no_semicolon_after_operator() {
        assert_eq!(
            kinds("a +\nb"),
            vec![
                TokenKind::Ident,
                TokenKind::Op(Op::Add),
                TokenKind::Ident,
                SEMI,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn semicolon_before_line_comment() {
        let src = "x++ // bump\ny";
        let lines = LineTable::new(src);
        let scanned = scan(src, &lines).unwrap();
        let semi = &scanned.tokens[2];
        assert!(semi.is_implicit_semicolon());
        assert_eq!(semi.pos, Pos::from_offset(4));
        assert_eq!(scanned.comments.len(), 1);
        assert_eq!(scanned.comments[0].text, "// bump");
        assert_eq!(scanned.comments[0].slash, Pos::from_offset(4));
    }

    #[test]
    fn block_comment_inside_line_keeps_statement_open() {
        assert_eq!(
            kinds("a /* c */ + b\n"),
            vec![
                TokenKind::Ident,
                TokenKind::Op(Op::Add),
                TokenKind::Ident,
                SEMI,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("0x1F 1_000 3.14 1e9 .5 0x1p-2 2i 0b1010 0o17"),
            vec![
                TokenKind::Int,
                TokenKind::Int,
                TokenKind::Float,
                TokenKind::Float,
                TokenKind::Float,
                TokenKind::Float,
                TokenKind::Imag,
                TokenKind::Int,
                TokenKind::Int,
                SEMI,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_and_runes() {
        let src = "\"a\\\"b\" `raw\nline` '\\n'";
        let lines = LineTable::new(src);
        let tokens = scan(src, &lines).unwrap().tokens;
        assert_eq!(tokens[0].text, "\"a\\\"b\"");
        assert_eq!(tokens[1].text, "`raw\nline`");
        assert_eq!(tokens[2].kind, TokenKind::Char);
    }

    #[test]
    fn unterminated_string() {
        let src = "package a\nvar s = \"oops\n";
        let lines = LineTable::new(src);
        let err = scan(src, &lines).unwrap_err();
        assert_eq!((err.line, err.column), (2, 9));
        assert!(err.message.contains("not terminated"), "Got: {}", err.message);
    }

    #[test]
    fn unterminated_comment() {
        let src = "/* never closed";
        let lines = LineTable::new(src);
        assert!(scan(src, &lines).is_err());
    }

    #[test]
    fn invalid_character() {
        let src = "a @ b";
        let lines = LineTable::new(src);
        let err = scan(src, &lines).unwrap_err();
        assert!(err.message.contains("U+0040"), "Got: {}", err.message);
    }

    #[test]
    fn unicode_identifier_and_bom() {
        let src = "\u{feff}package π";
        let lines = LineTable::new(src);
        let tokens = scan(src, &lines).unwrap().tokens;
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Package));
        assert_eq!(tokens[1].text, "π");
    }

    #[test]
    fn ellipsis_and_period() {
        assert_eq!(
            kinds("f(xs...)"),
            vec![
                TokenKind::Ident,
                TokenKind::Op(Op::LParen),
                TokenKind::Ident,
                TokenKind::Op(Op::Ellipsis),
                TokenKind::Op(Op::RParen),
                SEMI,
                TokenKind::Eof,
            ]
        );
    }
}
