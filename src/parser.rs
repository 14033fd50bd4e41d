//! Recursive-descent parser for Go source files.
//!
//! Declarations and blocks are turned into tree nodes; types and expressions
//! are only walked far enough to find their extent, the function literals
//! inside them, and the formatting hints the printer needs.

use std::collections::HashMap;

use crate::ast::{
    Block, Comment, CommentGroup, Decl, Expr, File, FuncDecl, GenDecl, GenDeclKind, Ident,
    ImportSpec, Spec, Stmt, TypeSpec, ValueSpec,
};
use crate::error::SyntaxError;
use crate::layout::Layout;
use crate::registry::{CommentGroupId, CommentRegistry};
use crate::scanner;
use crate::token::{Keyword, LineTable, Op, Pos, Token, TokenKind};

type PResult<T> = Result<T, SyntaxError>;

/// Parse one Go source file.
pub fn parse_file(src: &str) -> PResult<File> {
    let lines = LineTable::new(src);
    let scanned = scanner::scan(src, &lines)?;
    let (comments, lead) = group_comments(&scanned.tokens, scanned.comments, &lines);

    let mut parser = Parser {
        tokens: &scanned.tokens,
        cursor: 0,
        lines: &lines,
        lead: &lead,
        layout: Layout::default(),
    };
    let (doc, package, name, decls) = parser.source_file()?;
    let layout = parser.layout;

    Ok(File {
        doc,
        package,
        name,
        decls,
        comments,
        tokens: scanned.tokens,
        lines,
        layout,
    })
}

/// Split comments into groups and find the doc group of each token.
///
/// Comments separated by at most one line break, with no token between
/// them, form a group. A group starting on the line of the previous token
/// is a trailing comment. The last group that ends on the line right above
/// the next token is that token's lead comment.
fn group_comments(
    tokens: &[Token],
    comments: Vec<Comment>,
    lines: &LineTable,
) -> (CommentRegistry, HashMap<usize, CommentGroupId>) {
    let mut registry = CommentRegistry::new();
    let mut lead = HashMap::new();
    let mut pending = comments.into_iter().peekable();
    let mut prev_line = 0;

    for (idx, tok) in tokens.iter().enumerate() {
        if tok.is_implicit_semicolon() {
            continue;
        }
        let mut run = Vec::new();
        while let Some(comment) = pending.next_if(|c| c.slash < tok.pos) {
            run.push(comment);
        }
        if !run.is_empty() {
            let next_line = lines.line(tok.pos);
            let mut rest = run.as_slice();
            if prev_line > 0 && lines.line(rest[0].slash) == prev_line {
                let (group, _, tail) = take_group(rest, 0, lines);
                registry.register(group);
                rest = tail;
            }
            let mut last = None;
            while !rest.is_empty() {
                let (group, endline, tail) = take_group(rest, 1, lines);
                last = Some((registry.register(group), endline));
                rest = tail;
            }
            if let Some((id, endline)) = last {
                if endline + 1 == next_line {
                    lead.insert(idx, id);
                }
            }
        }
        prev_line = lines.line(tok.end());
    }
    (registry, lead)
}

fn take_group<'c>(
    run: &'c [Comment],
    gap: usize,
    lines: &LineTable,
) -> (CommentGroup, usize, &'c [Comment]) {
    let mut endline = lines.line(run[0].slash);
    let mut taken = 0;
    for comment in run {
        if lines.line(comment.slash) > endline + gap {
            break;
        }
        endline = lines.line(comment.end() - 1);
        taken += 1;
    }
    (
        CommentGroup::new(run[..taken].to_vec()),
        endline,
        &run[taken..],
    )
}

#[derive(Debug, Default, Clone, Copy)]
struct SpecMarks {
    type_start: Option<usize>,
    assign: Option<usize>,
    last: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct FieldMarks {
    type_start: Option<usize>,
    tag: Option<usize>,
    named: bool,
    last: usize,
}

struct Parser<'a> {
    tokens: &'a [Token],
    cursor: usize,
    lines: &'a LineTable,
    lead: &'a HashMap<usize, CommentGroupId>,
    layout: Layout,
}

impl<'a> Parser<'a> {
    // ---- token helpers ----

    fn tok(&self) -> &'a Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &'a Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.cursor + n).min(last)]
    }

    fn kind(&self) -> TokenKind {
        self.tok().kind
    }

    fn at_op(&self, op: Op) -> bool {
        self.tok().is_op(op)
    }

    fn at_kw(&self, kw: Keyword) -> bool {
        self.tok().is_keyword(kw)
    }

    fn at_eof(&self) -> bool {
        self.kind() == TokenKind::Eof
    }

    fn advance(&mut self) -> usize {
        let idx = self.cursor;
        if idx + 1 < self.tokens.len() {
            self.cursor += 1;
        }
        idx
    }

    /// The current token starts right where the previous one ends.
    fn adjacent(&self) -> bool {
        self.cursor > 0 && self.tokens[self.cursor - 1].end() == self.tok().pos
    }

    fn next_adjacent(&self) -> bool {
        self.tok().end() == self.peek_at(1).pos
    }

    fn prev_ends_operand(&self) -> bool {
        self.cursor > 0 && self.tokens[self.cursor - 1].ends_operand()
    }

    fn error_here(&self, expected: &str) -> SyntaxError {
        let tok = self.tok();
        self.lines
            .error(tok.pos, format!("expected {expected}, found {}", tok.describe()))
    }

    fn expect_op(&mut self, op: Op, expected: &str) -> PResult<usize> {
        if self.at_op(op) {
            Ok(self.advance())
        } else {
            Err(self.error_here(expected))
        }
    }

    fn expect_kw(&mut self, kw: Keyword, expected: &str) -> PResult<usize> {
        if self.at_kw(kw) {
            Ok(self.advance())
        } else {
            Err(self.error_here(expected))
        }
    }

    fn expect_ident(&mut self) -> PResult<Ident> {
        let tok = self.tok();
        if tok.kind != TokenKind::Ident {
            return Err(self.error_here("identifier"));
        }
        self.advance();
        Ok(Ident {
            name: tok.text.clone(),
            pos: tok.pos,
        })
    }

    /// A statement terminator, which may be left out before a closing `)`
    /// or `}`.
    fn expect_semi(&mut self, after: &str) -> PResult<()> {
        match self.kind() {
            TokenKind::Semicolon { .. } => {
                self.advance();
                Ok(())
            }
            TokenKind::Op(Op::RParen | Op::RBrace) | TokenKind::Eof => Ok(()),
            _ => Err(self.error_here(&format!("';' or newline after {after}"))),
        }
    }

    fn mark_prefix(&mut self) {
        let idx = self.advance();
        self.layout.prefix_ops.insert(idx);
    }

    fn mark_spaced(&mut self) {
        self.layout.spaced.insert(self.cursor);
    }

    // ---- declarations ----

    fn source_file(&mut self) -> PResult<(Option<CommentGroupId>, Pos, Ident, Vec<Decl>)> {
        let doc = self.lead.get(&self.cursor).copied();
        let package = self.tok().pos;
        self.expect_kw(Keyword::Package, "'package'")?;
        let name = self.expect_ident()?;
        self.expect_semi("package clause")?;

        let mut decls = Vec::new();
        while !self.at_eof() {
            let decl = match self.kind() {
                TokenKind::Keyword(Keyword::Func) => Decl::Func(self.func_decl()?),
                TokenKind::Keyword(
                    Keyword::Import | Keyword::Const | Keyword::Var | Keyword::Type,
                ) => Decl::Gen(self.gen_decl()?),
                _ => return Err(self.error_here("declaration")),
            };
            self.expect_semi("declaration")?;
            decls.push(decl);
        }
        Ok((doc, package, name, decls))
    }

    fn func_decl(&mut self) -> PResult<FuncDecl> {
        let doc = self.lead.get(&self.cursor).copied();
        let func_pos = self.tok().pos;
        self.advance();

        let recv = if self.at_op(Op::LParen) {
            let start = self.cursor;
            self.mark_spaced();
            self.params()?;
            Some(Expr {
                tokens: start..self.cursor,
                bodies: Vec::new(),
            })
        } else {
            None
        };
        let name = self.expect_ident()?;
        if self.at_op(Op::LBrack) {
            self.type_params()?;
        }
        self.signature()?;
        let body = if self.at_op(Op::LBrace) {
            Some(self.block()?)
        } else {
            None
        };
        Ok(FuncDecl {
            doc,
            func_pos,
            recv,
            name,
            body,
        })
    }

    /// An `import`, `const`, `var` or `type` declaration, without its
    /// terminating semicolon.
    fn gen_decl(&mut self) -> PResult<GenDecl> {
        let doc = self.lead.get(&self.cursor).copied();
        let kw_pos = self.tok().pos;
        let kind = match self.kind() {
            TokenKind::Keyword(Keyword::Import) => GenDeclKind::Import,
            TokenKind::Keyword(Keyword::Const) => GenDeclKind::Const,
            TokenKind::Keyword(Keyword::Var) => GenDeclKind::Var,
            TokenKind::Keyword(Keyword::Type) => GenDeclKind::Type,
            _ => return Err(self.error_here("declaration")),
        };
        self.advance();

        if !self.at_op(Op::LParen) {
            let (spec, _) = self.spec(kind)?;
            return Ok(GenDecl {
                doc,
                kind,
                kw_pos,
                l_paren: None,
                specs: vec![spec],
                r_paren: None,
            });
        }

        let l_paren = self.tok().pos;
        self.advance();
        let mut specs = Vec::new();
        let mut marks = Vec::new();
        while !self.at_op(Op::RParen) {
            if self.at_eof() {
                return Err(self.error_here("')'"));
            }
            let first = self.cursor;
            let (spec, mark) = self.spec(kind)?;
            if let Spec::Import(import) = &spec {
                self.layout.import_specs.insert(first, import_sort_key(import));
            }
            specs.push(spec);
            marks.push(mark);
            if !self.at_op(Op::RParen) {
                self.expect_semi("spec")?;
            }
        }
        let r_paren = self.tok().pos;
        self.advance();

        if specs.len() > 1 {
            match kind {
                GenDeclKind::Const | GenDeclKind::Var => self.align_value_specs(&marks),
                GenDeclKind::Type => {
                    for mark in &marks {
                        if let Some(start) = mark.type_start {
                            self.layout.add_cells(start, 1);
                        }
                    }
                }
                GenDeclKind::Import => {}
            }
        }

        Ok(GenDecl {
            doc,
            kind,
            kw_pos,
            l_paren: Some(l_paren),
            specs,
            r_paren: Some(r_paren),
        })
    }

    fn spec(&mut self, kind: GenDeclKind) -> PResult<(Spec, SpecMarks)> {
        match kind {
            GenDeclKind::Import => Ok((Spec::Import(self.import_spec()?), SpecMarks::default())),
            GenDeclKind::Const | GenDeclKind::Var => {
                let (spec, marks) = self.value_spec(kind)?;
                Ok((Spec::Value(spec), marks))
            }
            GenDeclKind::Type => {
                let (spec, marks) = self.type_spec()?;
                Ok((Spec::Type(spec), marks))
            }
        }
    }

    fn import_spec(&mut self) -> PResult<ImportSpec> {
        let name = match self.kind() {
            TokenKind::Ident => Some(self.expect_ident()?),
            TokenKind::Op(Op::Period) => {
                let pos = self.tok().pos;
                self.advance();
                Some(Ident {
                    name: ".".to_string(),
                    pos,
                })
            }
            _ => None,
        };
        if self.kind() != TokenKind::String {
            return Err(self.error_here("import path"));
        }
        if name.is_some() {
            self.mark_spaced();
        }
        let path = self.tok().text.clone();
        self.advance();
        Ok(ImportSpec { name, path })
    }

    fn value_spec(&mut self, kind: GenDeclKind) -> PResult<(ValueSpec, SpecMarks)> {
        let mut names = vec![self.expect_ident()?];
        while self.at_op(Op::Comma) {
            self.advance();
            names.push(self.expect_ident()?);
        }

        let mut marks = SpecMarks::default();
        let ty = if !self.at_op(Op::Assign) && !self.at_spec_end() {
            marks.type_start = Some(self.cursor);
            self.mark_spaced();
            Some(self.parse_type()?)
        } else {
            None
        };

        let mut values = Vec::new();
        if self.at_op(Op::Assign) {
            marks.assign = Some(self.advance());
            values = self.expr_list()?;
        }
        if kind == GenDeclKind::Var && ty.is_none() && values.is_empty() {
            return Err(self.error_here("type or initialization"));
        }
        marks.last = self.cursor - 1;
        Ok((ValueSpec { names, ty, values }, marks))
    }

    fn type_spec(&mut self) -> PResult<(TypeSpec, SpecMarks)> {
        let name = self.expect_ident()?;
        let mut type_params = None;
        if self.at_op(Op::LBrack) && self.adjacent() && !self.peek_at(1).is_op(Op::RBrack) {
            let start = self.cursor;
            self.type_params()?;
            type_params = Some(Expr {
                tokens: start..self.cursor,
                bodies: Vec::new(),
            });
        }

        let mut marks = SpecMarks {
            type_start: Some(self.cursor),
            ..SpecMarks::default()
        };
        self.mark_spaced();
        let alias = self.at_op(Op::Assign);
        if alias {
            self.advance();
        }
        let ty = self.parse_type()?;
        marks.last = self.cursor - 1;
        Ok((
            TypeSpec {
                name,
                type_params,
                alias,
                ty,
            },
            marks,
        ))
    }

    fn at_spec_end(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Semicolon { .. }
                | TokenKind::Op(Op::RParen | Op::RBrace)
                | TokenKind::Eof
        )
    }

    /// Column breaks for a parenthesized `const`/`var` group: names, type,
    /// `= values`, trailing comment.
    fn align_value_specs(&mut self, marks: &[SpecMarks]) {
        let keep = keep_type_column(marks);
        for (mark, keep_type) in marks.iter().zip(keep) {
            let mut extra = 3;
            let mut pending = 0;
            if mark.type_start.is_some() || keep_type {
                match mark.type_start {
                    Some(start) => self.layout.add_cells(start, 1),
                    None => pending += 1,
                }
                extra -= 1;
            }
            if let Some(assign) = mark.assign {
                self.layout.add_cells(assign, pending + 1);
                pending = 0;
                extra -= 1;
            }
            self.layout.comment_cells.insert(mark.last, pending + extra);
        }
    }

    // ---- types ----

    fn parse_type(&mut self) -> PResult<Expr> {
        let start = self.cursor;
        self.ty()?;
        Ok(Expr {
            tokens: start..self.cursor,
            bodies: Vec::new(),
        })
    }

    fn ty(&mut self) -> PResult<()> {
        match self.kind() {
            TokenKind::Ident => {
                self.advance();
                if self.at_op(Op::Period) {
                    self.advance();
                    self.expect_ident()?;
                }
                if self.at_op(Op::LBrack) && self.adjacent() {
                    self.type_args()?;
                }
                Ok(())
            }
            TokenKind::Op(Op::Mul) => {
                self.mark_prefix();
                self.ty()
            }
            TokenKind::Op(Op::Arrow) => {
                self.mark_prefix();
                self.expect_kw(Keyword::Chan, "'chan'")?;
                self.ty()
            }
            TokenKind::Op(Op::LParen) => {
                self.advance();
                self.ty()?;
                self.expect_op(Op::RParen, "')'")?;
                Ok(())
            }
            TokenKind::Op(Op::LBrack) => {
                self.advance();
                if self.at_op(Op::Ellipsis) {
                    self.advance();
                } else if !self.at_op(Op::RBrack) {
                    let mut bodies = Vec::new();
                    self.expr_until(&mut bodies, |t| t.is_op(Op::RBrack))?;
                }
                self.expect_op(Op::RBrack, "']'")?;
                self.ty()
            }
            TokenKind::Keyword(Keyword::Map) => {
                self.advance();
                self.expect_op(Op::LBrack, "'['")?;
                self.ty()?;
                self.expect_op(Op::RBrack, "']'")?;
                self.ty()
            }
            TokenKind::Keyword(Keyword::Chan) => {
                self.advance();
                if self.at_op(Op::Arrow) {
                    self.advance();
                }
                self.ty()
            }
            TokenKind::Keyword(Keyword::Func) => {
                self.advance();
                self.signature()
            }
            TokenKind::Keyword(Keyword::Struct) => self.struct_type(),
            TokenKind::Keyword(Keyword::Interface) => self.interface_type(),
            _ => Err(self.error_here("type")),
        }
    }

    /// A type, or a `|` union of `~`-prefixed terms.
    fn constraint(&mut self) -> PResult<()> {
        loop {
            if self.at_op(Op::Tilde) {
                self.mark_prefix();
            }
            self.ty()?;
            if !self.at_op(Op::Or) {
                return Ok(());
            }
            self.advance();
        }
    }

    fn type_args(&mut self) -> PResult<()> {
        let open = self.advance();
        self.layout.type_brackets.insert(open);
        while !self.at_op(Op::RBrack) {
            self.constraint()?;
            if !self.at_op(Op::Comma) {
                break;
            }
            self.advance();
        }
        self.expect_op(Op::RBrack, "']'")?;
        Ok(())
    }

    fn type_params(&mut self) -> PResult<()> {
        let open = self.advance();
        self.layout.type_brackets.insert(open);
        while !self.at_op(Op::RBrack) {
            if self.kind() == TokenKind::Ident && self.is_param_name() {
                self.advance();
                self.mark_spaced();
            }
            self.constraint()?;
            if !self.at_op(Op::Comma) {
                break;
            }
            self.advance();
        }
        self.expect_op(Op::RBrack, "']'")?;
        Ok(())
    }

    /// Whether the identifier under the cursor names a parameter or field,
    /// judging by what follows it.
    fn is_param_name(&self) -> bool {
        let next = self.peek_at(1);
        match next.kind {
            TokenKind::Ident => true,
            TokenKind::Op(Op::Mul | Op::LParen | Op::Arrow | Op::Ellipsis | Op::Tilde) => true,
            TokenKind::Op(Op::LBrack) => !self.next_adjacent(),
            TokenKind::Keyword(
                Keyword::Map | Keyword::Chan | Keyword::Func | Keyword::Struct | Keyword::Interface,
            ) => true,
            _ => false,
        }
    }

    fn params(&mut self) -> PResult<()> {
        self.expect_op(Op::LParen, "'('")?;
        while !self.at_op(Op::RParen) {
            if self.at_eof() {
                return Err(self.error_here("')'"));
            }
            if self.kind() == TokenKind::Ident && self.is_param_name() {
                self.advance();
                self.mark_spaced();
            }
            if self.at_op(Op::Ellipsis) {
                self.advance();
            }
            self.ty()?;
            if !self.at_op(Op::Comma) {
                break;
            }
            self.advance();
        }
        self.expect_op(Op::RParen, "')'")?;
        Ok(())
    }

    fn signature(&mut self) -> PResult<()> {
        self.params()?;
        if self.at_op(Op::LParen) {
            self.mark_spaced();
            self.params()?;
        } else if self.at_type_start() {
            self.mark_spaced();
            self.ty()?;
        }
        Ok(())
    }

    fn at_type_start(&self) -> bool {
        match self.kind() {
            TokenKind::Ident => true,
            TokenKind::Op(Op::Mul | Op::LBrack | Op::Arrow) => true,
            TokenKind::Keyword(kw) => matches!(
                kw,
                Keyword::Map | Keyword::Chan | Keyword::Func | Keyword::Struct | Keyword::Interface
            ),
            _ => false,
        }
    }

    fn struct_type(&mut self) -> PResult<()> {
        self.advance();
        let lbrace = self.expect_op(Op::LBrace, "'{'")?;
        self.layout.type_braces.insert(lbrace);

        let mut fields = Vec::new();
        loop {
            match self.kind() {
                TokenKind::Op(Op::RBrace) => break,
                TokenKind::Semicolon { .. } => {
                    self.advance();
                    continue;
                }
                TokenKind::Eof => return Err(self.error_here("'}'")),
                _ => {}
            }
            fields.push(self.field_decl()?);
            if !self.at_op(Op::RBrace) {
                self.expect_semi("field")?;
            }
        }
        let rbrace = self.advance();

        let multiline = self.lines.line(self.tokens[lbrace].pos)
            != self.lines.line(self.tokens[rbrace].pos);
        if multiline && fields.len() > 1 {
            for field in &fields {
                if let Some(start) = field.type_start {
                    self.layout.add_cells(start, 1);
                }
                let tabs = match (field.named, field.tag) {
                    (true, Some(tag)) => {
                        self.layout.add_cells(tag, 1);
                        0
                    }
                    (false, Some(tag)) => {
                        self.layout.add_cells(tag, 2);
                        0
                    }
                    (true, None) => 1,
                    (false, None) => 2,
                };
                self.layout.comment_cells.insert(field.last, tabs);
            }
        }
        Ok(())
    }

    fn field_decl(&mut self) -> PResult<FieldMarks> {
        let mut marks = FieldMarks::default();
        let named = self.kind() == TokenKind::Ident
            && (self.peek_at(1).is_op(Op::Comma) || self.is_param_name());
        if named {
            self.advance();
            while self.at_op(Op::Comma) {
                self.advance();
                self.expect_ident()?;
            }
            marks.type_start = Some(self.cursor);
            marks.named = true;
            self.mark_spaced();
        }
        self.ty()?;
        if self.kind() == TokenKind::String {
            marks.tag = Some(self.advance());
        }
        marks.last = self.cursor - 1;
        Ok(marks)
    }

    fn interface_type(&mut self) -> PResult<()> {
        self.advance();
        let lbrace = self.expect_op(Op::LBrace, "'{'")?;
        self.layout.type_braces.insert(lbrace);
        loop {
            match self.kind() {
                TokenKind::Op(Op::RBrace) => break,
                TokenKind::Semicolon { .. } => {
                    self.advance();
                    continue;
                }
                TokenKind::Eof => return Err(self.error_here("'}'")),
                _ => {}
            }
            if self.kind() == TokenKind::Ident && self.peek_at(1).is_op(Op::LParen) {
                self.advance();
                self.signature()?;
            } else {
                self.constraint()?;
            }
            if !self.at_op(Op::RBrace) {
                self.expect_semi("interface element")?;
            }
        }
        self.advance();
        Ok(())
    }

    // ---- expressions ----

    /// Consume tokens up to `stop` (or a separator or closer) at the current
    /// nesting level. May be empty.
    fn expr_until(
        &mut self,
        bodies: &mut Vec<Block>,
        stop: impl Fn(&Token) -> bool,
    ) -> PResult<usize> {
        let start = self.cursor;
        loop {
            let tok = self.tok();
            if stop(tok) {
                break;
            }
            match tok.kind {
                TokenKind::Eof | TokenKind::Semicolon { .. } => break,
                TokenKind::Op(op) if op.is_close() => break,
                _ => self.expr_item(bodies)?,
            }
        }
        Ok(start)
    }

    fn expr(&mut self, stop: impl Fn(&Token) -> bool) -> PResult<Expr> {
        let mut bodies = Vec::new();
        let start = self.expr_until(&mut bodies, stop)?;
        if self.cursor == start {
            return Err(self.error_here("expression"));
        }
        Ok(Expr {
            tokens: start..self.cursor,
            bodies,
        })
    }

    fn expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut list = vec![self.expr(|t| t.is_op(Op::Comma))?];
        while self.at_op(Op::Comma) {
            self.advance();
            list.push(self.expr(|t| t.is_op(Op::Comma))?);
        }
        Ok(list)
    }

    /// One token or bracketed group of an expression.
    fn expr_item(&mut self, bodies: &mut Vec<Block>) -> PResult<()> {
        match self.kind() {
            TokenKind::Op(Op::LBrack) if !self.prev_ends_operand() => {
                self.ty()?;
                self.composite_body(bodies)
            }
            TokenKind::Op(Op::LParen | Op::LBrack | Op::LBrace) => self.group(bodies),
            TokenKind::Keyword(Keyword::Func) => {
                self.advance();
                self.signature()?;
                if self.at_op(Op::LBrace) {
                    bodies.push(self.block()?);
                }
                Ok(())
            }
            TokenKind::Keyword(Keyword::Map | Keyword::Struct) => {
                self.ty()?;
                self.composite_body(bodies)
            }
            TokenKind::Keyword(Keyword::Chan | Keyword::Interface) => self.ty(),
            TokenKind::Op(Op::Arrow) if self.peek_at(1).is_keyword(Keyword::Chan) => self.ty(),
            _ => {
                self.advance();
                Ok(())
            }
        }
    }

    fn composite_body(&mut self, bodies: &mut Vec<Block>) -> PResult<()> {
        if self.at_op(Op::LBrace) {
            self.group(bodies)
        } else {
            Ok(())
        }
    }

    /// A bracketed group, with its contents scanned as expressions.
    fn group(&mut self, bodies: &mut Vec<Block>) -> PResult<()> {
        let close = match self.kind() {
            TokenKind::Op(op) => op.closing(),
            _ => None,
        };
        let Some(close) = close else {
            return Err(self.error_here("'(', '[' or '{'"));
        };
        let expected = match close {
            Op::RParen => "')'",
            Op::RBrack => "']'",
            _ => "'}'",
        };
        self.advance();
        loop {
            match self.kind() {
                TokenKind::Op(op) if op == close => {
                    self.advance();
                    return Ok(());
                }
                TokenKind::Op(op) if op.is_close() => return Err(self.error_here(expected)),
                TokenKind::Eof => return Err(self.error_here(expected)),
                TokenKind::Semicolon { .. } => {
                    self.advance();
                }
                _ => self.expr_item(bodies)?,
            }
        }
    }

    // ---- statements ----

    fn block(&mut self) -> PResult<Block> {
        let open = self.expect_op(Op::LBrace, "'{'")?;
        self.layout.block_braces.insert(open);
        let lbrace = self.tokens[open].pos;

        let mut stmts = Vec::new();
        loop {
            match self.kind() {
                TokenKind::Op(Op::RBrace) => break,
                TokenKind::Eof => return Err(self.error_here("'}'")),
                TokenKind::Semicolon { .. } => {
                    self.advance();
                    continue;
                }
                _ => {}
            }
            let (stmt, needs_semi) = self.stmt()?;
            stmts.extend(stmt);
            if needs_semi && !self.at_op(Op::RBrace) {
                self.expect_semi("statement")?;
            }
        }
        let rbrace = self.tokens[self.advance()].pos;
        Ok(Block {
            lbrace,
            stmts,
            rbrace,
        })
    }

    /// One statement, and whether a terminator must follow it. Clause
    /// headers and labels are followed directly by the next statement.
    fn stmt(&mut self) -> PResult<(Option<Stmt>, bool)> {
        let start = self.cursor;
        match self.kind() {
            TokenKind::Keyword(Keyword::Var | Keyword::Const | Keyword::Type) => {
                Ok((Some(Stmt::Decl(self.gen_decl()?)), true))
            }
            TokenKind::Op(Op::LBrace) => Ok((Some(Stmt::Block(self.block()?)), true)),
            TokenKind::Keyword(Keyword::If) => {
                let mut bodies = Vec::new();
                self.if_stmt(&mut bodies)?;
                Ok((Some(other(start..self.cursor, bodies)), true))
            }
            TokenKind::Keyword(Keyword::For | Keyword::Switch | Keyword::Select) => {
                self.advance();
                let mut bodies = Vec::new();
                self.header(&mut bodies)?;
                bodies.push(self.block()?);
                Ok((Some(other(start..self.cursor, bodies)), true))
            }
            TokenKind::Keyword(Keyword::Case | Keyword::Default) => {
                self.layout.outdent.insert(start);
                let is_case = self.at_kw(Keyword::Case);
                self.advance();
                let mut bodies = Vec::new();
                if is_case {
                    self.expr_until(&mut bodies, |t| t.is_op(Op::Colon))?;
                }
                self.expect_op(Op::Colon, "':'")?;
                Ok((Some(other(start..self.cursor, bodies)), false))
            }
            TokenKind::Ident if self.peek_at(1).is_op(Op::Colon) => {
                self.layout.outdent.insert(start);
                self.advance();
                self.advance();
                Ok((None, false))
            }
            _ => Ok((Some(Stmt::Other(self.expr(|_| false)?)), true)),
        }
    }

    fn if_stmt(&mut self, bodies: &mut Vec<Block>) -> PResult<()> {
        self.advance();
        self.header(bodies)?;
        bodies.push(self.block()?);
        if self.at_kw(Keyword::Else) {
            self.advance();
            if self.at_kw(Keyword::If) {
                self.if_stmt(bodies)?;
            } else if self.at_op(Op::LBrace) {
                bodies.push(self.block()?);
            } else {
                return Err(self.error_here("'if' or '{' after else"));
            }
        }
        Ok(())
    }

    /// Control clause header up to the body's `{`.
    fn header(&mut self, bodies: &mut Vec<Block>) -> PResult<()> {
        loop {
            self.expr_until(bodies, |t| t.is_op(Op::LBrace))?;
            match self.kind() {
                TokenKind::Op(Op::LBrace) => return Ok(()),
                TokenKind::Semicolon { implicit: false } => {
                    self.layout.header_semis.insert(self.cursor);
                    self.advance();
                }
                _ => return Err(self.error_here("'{'")),
            }
        }
    }
}

fn other(tokens: std::ops::Range<usize>, bodies: Vec<Block>) -> Stmt {
    Stmt::Other(Expr { tokens, bodies })
}

/// Which specs of a value group keep an (empty) type column: every spec in
/// a run of specs with values, if any spec in that run has a type.
fn keep_type_column(marks: &[SpecMarks]) -> Vec<bool> {
    let mut keep = vec![false; marks.len()];
    let mut run_start = None;
    let mut keep_type = false;
    for (i, mark) in marks.iter().enumerate() {
        if mark.assign.is_some() {
            if run_start.is_none() {
                run_start = Some(i);
                keep_type = false;
            }
        } else if let Some(start) = run_start.take() {
            if keep_type {
                keep[start..i].fill(true);
            }
        }
        if mark.type_start.is_some() {
            keep_type = true;
        }
    }
    if let Some(start) = run_start {
        if keep_type {
            keep[start..].fill(true);
        }
    }
    keep
}

fn import_sort_key(spec: &ImportSpec) -> String {
    let path = spec.path.trim_matches(|c| c == '"' || c == '`');
    match &spec.name {
        Some(name) => format!("{path}\u{0}{}", name.name),
        None => path.to_string(),
    }
}
