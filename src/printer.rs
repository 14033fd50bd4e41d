//! Canonical (gofmt-style) printing of a parsed file.
//!
//! The printer replays the token stream, interleaving comments by position.
//! Line breaks come from the source (at most one blank line is kept),
//! indentation from bracket nesting, and blanks from Go's spacing rules.
//! Aligned sections are expressed as cells and laid out by [`crate::align`].

use std::collections::{HashMap, HashSet};

use crate::align::{self, Line};
use crate::ast::{Comment, File};
use crate::layout::Layout;
use crate::token::{Keyword, Op, Pos, Token, TokenKind};

/// Print `file` in canonical form.
pub fn print(file: &File) -> String {
    let analysis = Analyzer::run(file);
    let mut printer = Printer::new(file, &analysis);
    printer.emit();
    printer.finish()
}

// ---- expression analysis ----

/// Per-token facts derived from the bracket structure and operator
/// precedence.
struct Analysis {
    partner: Vec<Option<usize>>,
    enclosing: Vec<Option<usize>>,
    binary: Vec<bool>,
    compact: Vec<bool>,
    /// Slice colons printed with blanks around them.
    slice_blanks: HashSet<usize>,
    /// Colons of key/value elements followed by a column break.
    pair_colons: HashSet<usize>,
    /// Tokens that start a new alignment section.
    sections: HashSet<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ctx {
    File,
    Block,
    Specs,
    List,
}

#[derive(Debug, Clone, Copy)]
enum Item {
    Tok(usize),
    Group(usize, usize),
}

enum Node {
    Leaf(usize),
    Binary {
        op: usize,
        prec: u8,
        left: Box<Node>,
        right: Box<Node>,
    },
}

struct Analyzer<'a> {
    file: &'a File,
    tokens: &'a [Token],
    layout: &'a Layout,
    out: Analysis,
}

impl<'a> Analyzer<'a> {
    fn run(file: &'a File) -> Analysis {
        let tokens = file.tokens.as_slice();
        let n = tokens.len();
        let mut partner = vec![None; n];
        let mut enclosing = vec![None; n];
        let mut stack: Vec<usize> = Vec::new();
        for (i, tok) in tokens.iter().enumerate() {
            enclosing[i] = stack.last().copied();
            match tok.kind {
                TokenKind::Op(op) if op.is_open() => stack.push(i),
                TokenKind::Op(op) if op.is_close() => {
                    if let Some(open) = stack.pop() {
                        partner[open] = Some(i);
                        partner[i] = Some(open);
                    }
                }
                _ => {}
            }
        }

        let mut analyzer = Analyzer {
            file,
            tokens,
            layout: &file.layout,
            out: Analysis {
                partner,
                enclosing,
                binary: vec![false; n],
                compact: vec![false; n],
                slice_blanks: HashSet::new(),
                pair_colons: HashSet::new(),
                sections: HashSet::new(),
            },
        };
        analyzer.seq(0, n, Ctx::File, 1);
        analyzer.out
    }

    fn items(&self, lo: usize, hi: usize) -> Vec<Item> {
        let mut items = Vec::new();
        let mut i = lo;
        while i < hi {
            let tok = &self.tokens[i];
            if tok.kind == TokenKind::Eof {
                break;
            }
            match (tok.kind, self.out.partner[i]) {
                (TokenKind::Op(op), Some(close)) if op.is_open() => {
                    items.push(Item::Group(i, close));
                    i = close + 1;
                }
                _ => {
                    items.push(Item::Tok(i));
                    i += 1;
                }
            }
        }
        items
    }

    fn is_tok(&self, item: &Item, pred: impl Fn(&Token) -> bool) -> bool {
        matches!(item, Item::Tok(t) if pred(&self.tokens[*t]))
    }

    /// Statements (or list elements) between `lo` and `hi`.
    fn seq(&mut self, lo: usize, hi: usize, ctx: Ctx, depth: usize) {
        let items = self.items(lo, hi);
        let stmts: Vec<&[Item]> = items
            .split(|item| self.is_tok(item, Token::is_semicolon))
            .collect();
        for stmt in stmts {
            let bump = ctx == Ctx::Block && self.multi_assign(stmt);
            self.runs(stmt, depth + usize::from(bump));
        }
    }

    /// An assignment with several values on both sides.
    fn multi_assign(&self, stmt: &[Item]) -> bool {
        if stmt
            .first()
            .is_some_and(|i| self.is_tok(i, |t| t.is_keyword(Keyword::Var) || t.is_keyword(Keyword::Const)))
        {
            return false;
        }
        let Some(assign) = stmt
            .iter()
            .position(|i| self.is_tok(i, |t| matches!(t.kind, TokenKind::Op(op) if op.is_assign())))
        else {
            return false;
        };
        let comma = |i: &Item| self.is_tok(i, |t| t.is_op(Op::Comma));
        stmt[..assign].iter().any(comma) && stmt[assign + 1..].iter().any(comma)
    }

    /// Split a statement into expression runs at separators and analyze
    /// each run.
    fn runs(&mut self, items: &[Item], depth: usize) {
        let mut start = 0;
        let mut ends_operand = false;
        for (i, item) in items.iter().enumerate() {
            let separator = match *item {
                Item::Tok(t) => self.is_separator(t, ends_operand),
                Item::Group(open, _) => self.layout.block_braces.contains(&open),
            };
            if separator {
                self.expr(&items[start..i], depth);
                if let Item::Group(open, close) = *item {
                    self.seq(open + 1, close, Ctx::Block, 1);
                }
                start = i + 1;
                ends_operand = false;
            } else {
                ends_operand = self.ends_operand(*item, ends_operand);
            }
        }
        self.expr(&items[start..], depth);
    }

    fn is_separator(&self, t: usize, ends_operand: bool) -> bool {
        match self.tokens[t].kind {
            TokenKind::Op(Op::Comma | Op::Colon | Op::Inc | Op::Dec | Op::Ellipsis) => true,
            TokenKind::Op(Op::Arrow) => ends_operand,
            TokenKind::Op(op) => op.is_assign(),
            TokenKind::Keyword(kw) => !matches!(
                kw,
                Keyword::Func | Keyword::Map | Keyword::Chan | Keyword::Struct | Keyword::Interface
            ),
            _ => false,
        }
    }

    fn ends_operand(&self, item: Item, before: bool) -> bool {
        match item {
            Item::Tok(t) => {
                let kind = self.tokens[t].kind;
                kind == TokenKind::Ident || kind.is_literal()
            }
            Item::Group(open, _) => {
                // `[]T` is a type prefix, `x[i]` an operand
                !self.tokens[open].is_op(Op::LBrack) || before
            }
        }
    }

    /// One expression: find its binary operators, decide their spacing and
    /// analyze the operands.
    fn expr(&mut self, items: &[Item], depth: usize) {
        if items.is_empty() {
            return;
        }
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        let mut start = 0;
        let mut ends_operand = false;
        for (i, &item) in items.iter().enumerate() {
            if let Item::Tok(t) = item {
                if let TokenKind::Op(op) = self.tokens[t].kind {
                    let prec = op.precedence();
                    if prec > 0 && ends_operand && !self.layout.prefix_ops.contains(&t) {
                        self.out.binary[t] = true;
                        operands.push(start..i);
                        ops.push((t, prec));
                        start = i + 1;
                        ends_operand = false;
                        continue;
                    }
                }
            }
            ends_operand = self.ends_operand(item, ends_operand);
        }
        operands.push(start..items.len());

        if ops.is_empty() {
            self.operand(items, depth);
            return;
        }
        let mut next = 0;
        let tree = build_tree(&ops, &mut next, 1);
        let leaves: Vec<&[Item]> = operands.iter().map(|r| &items[r.clone()]).collect();
        let cutoff = self.cutoff(&tree, &leaves, depth);
        self.binary_expr(&tree, &leaves, cutoff, depth);
    }

    fn binary_expr(&mut self, node: &Node, leaves: &[&[Item]], cutoff: u8, depth: usize) {
        match node {
            Node::Leaf(i) => self.operand(leaves[*i], depth),
            Node::Binary {
                op,
                prec,
                left,
                right,
            } => {
                self.out.compact[*op] = *prec >= cutoff;
                let left_depth = depth + diff_prec(left, *prec);
                self.sub_expr(left, leaves, left_depth);
                self.sub_expr(right, leaves, depth + 1);
            }
        }
    }

    fn sub_expr(&mut self, node: &Node, leaves: &[&[Item]], depth: usize) {
        match node {
            Node::Leaf(i) => self.operand(leaves[*i], depth),
            Node::Binary { .. } => {
                let cutoff = self.cutoff(node, leaves, depth);
                self.binary_expr(node, leaves, cutoff, depth);
            }
        }
    }

    fn cutoff(&self, node: &Node, leaves: &[&[Item]], depth: usize) -> u8 {
        let (has4, has5, max_problem) = self.walk_binary(node, leaves);
        if max_problem > 0 {
            return max_problem + 1;
        }
        match (has4 && has5, depth == 1) {
            (true, true) => 5,
            (true, false) => 4,
            (false, true) => 6,
            (false, false) => 4,
        }
    }

    fn walk_binary(&self, node: &Node, leaves: &[&[Item]]) -> (bool, bool, u8) {
        let Node::Binary {
            op,
            prec,
            left,
            right,
        } = node
        else {
            return (false, false, 0);
        };
        let mut has4 = *prec == 4;
        let mut has5 = *prec == 5;
        let mut max_problem = 0;

        if let Node::Binary { .. } = **left {
            let (h4, h5, mp) = self.walk_binary(left, leaves);
            has4 |= h4;
            has5 |= h5;
            max_problem = max_problem.max(mp);
        }
        match &**right {
            Node::Binary { .. } => {
                let (h4, h5, mp) = self.walk_binary(right, leaves);
                has4 |= h4;
                has5 |= h5;
                max_problem = max_problem.max(mp);
            }
            Node::Leaf(i) => {
                if let Some(Item::Tok(u)) = leaves[*i].first() {
                    let unary = &self.tokens[*u];
                    if matches!(unary.kind, TokenKind::Op(o) if o.is_unary()) {
                        let pair = format!("{}{}", self.tokens[*op].text, unary.text);
                        match pair.as_str() {
                            "/*" | "&&" | "&^" => max_problem = 5,
                            "++" | "--" => max_problem = max_problem.max(4),
                            _ => {}
                        }
                    }
                }
            }
        }
        (has4, has5, max_problem)
    }

    /// Groups inside a single operand.
    fn operand(&mut self, items: &[Item], depth: usize) {
        for item in items {
            if let Item::Group(open, close) = *item {
                self.group(open, close, depth);
            }
        }
    }

    fn group(&mut self, open: usize, close: usize, depth: usize) {
        let tokens = self.tokens;
        let before = open.checked_sub(1).map(|i| &tokens[i]);
        let after_operand = before.is_some_and(Token::ends_operand);
        match tokens[open].kind {
            TokenKind::Op(Op::LParen) => {
                let spec_group = before.is_some_and(|t| {
                    matches!(
                        t.kind,
                        TokenKind::Keyword(
                            Keyword::Var | Keyword::Const | Keyword::Import | Keyword::Type
                        )
                    )
                });
                if spec_group {
                    self.seq(open + 1, close, Ctx::Specs, 1);
                } else if after_operand {
                    let depth = if self.arg_count(open, close) > 1 {
                        depth + 1
                    } else {
                        depth
                    };
                    self.seq(open + 1, close, Ctx::List, depth);
                } else if before.is_some_and(|t| t.is_keyword(Keyword::Func)) {
                    self.seq(open + 1, close, Ctx::List, 1);
                } else {
                    self.seq(open + 1, close, Ctx::List, depth.saturating_sub(1).max(1));
                }
            }
            TokenKind::Op(Op::LBrack) => {
                if self.layout.type_brackets.contains(&open) || !after_operand {
                    self.seq(open + 1, close, Ctx::List, 1);
                } else {
                    self.index(open, close, depth);
                }
            }
            _ => {
                if self.layout.block_braces.contains(&open) {
                    self.seq(open + 1, close, Ctx::Block, 1);
                } else if self.layout.type_braces.contains(&open) {
                    self.seq(open + 1, close, Ctx::Specs, 1);
                } else {
                    self.seq(open + 1, close, Ctx::List, 1);
                    self.align_pairs(open, close);
                }
            }
        }
    }

    fn arg_count(&self, open: usize, close: usize) -> usize {
        let items = self.items(open + 1, close);
        items
            .split(|i| self.is_tok(i, |t| t.is_op(Op::Comma)))
            .filter(|part| !part.is_empty())
            .count()
    }

    fn index(&mut self, open: usize, close: usize, depth: usize) {
        let items = self.items(open + 1, close);
        if items.iter().any(|i| self.is_tok(i, |t| t.is_op(Op::Comma))) {
            self.seq(open + 1, close, Ctx::List, depth + 1);
            return;
        }
        let segments: Vec<&[Item]> = items
            .split(|i| self.is_tok(i, |t| t.is_op(Op::Colon)))
            .collect();
        for segment in &segments {
            self.runs(segment, depth + 1);
        }
        if segments.len() < 2 || depth > 1 {
            return;
        }
        let filled = segments.iter().filter(|s| !s.is_empty()).count();
        let binary = segments.iter().any(|s| {
            s.iter()
                .any(|i| matches!(i, Item::Tok(t) if self.out.binary[*t]))
        });
        if filled > 1 && binary {
            for item in &items {
                if let Item::Tok(t) = *item {
                    if self.tokens[t].is_op(Op::Colon) {
                        self.out.slice_blanks.insert(t);
                    }
                }
            }
        }
    }

    fn line(&self, pos: Pos) -> usize {
        self.file.line(pos)
    }

    fn last_token(&self, items: &[Item]) -> Option<usize> {
        items.last().map(|item| match *item {
            Item::Tok(t) => t,
            Item::Group(_, close) => close,
        })
    }

    fn first_token(&self, items: &[Item]) -> Option<usize> {
        items.first().map(|item| match *item {
            Item::Tok(t) | Item::Group(t, _) => t,
        })
    }

    /// Column alignment of `key: value` elements in a multi-line composite
    /// literal, with the size heuristic that starts a new section when key
    /// lengths vary too much.
    fn align_pairs(&mut self, open: usize, close: usize) {
        let open_line = self.line(self.tokens[open].pos);
        if open_line == self.line(self.tokens[close].pos) {
            return;
        }
        let items = self.items(open + 1, close);
        let elements: Vec<&[Item]> = items
            .split(|i| self.is_tok(i, |t| t.is_op(Op::Comma) || t.is_semicolon()))
            .filter(|e| !e.is_empty())
            .collect();
        if elements.len() < 2 {
            return;
        }

        let mut size = 0usize;
        let mut lnsum = 0f64;
        let mut count = 0usize;
        let mut prev_break: Option<usize> = None;
        let mut prev_end_line = open_line;
        for (i, element) in elements.iter().enumerate() {
            let (Some(first), Some(last)) = (self.first_token(element), self.last_token(element))
            else {
                continue;
            };
            let line = self.line(self.tokens[first].pos);
            let end_line = self.line(self.tokens[last].end() - 1);
            let colon = element
                .iter()
                .position(|it| self.is_tok(it, |t| t.is_op(Op::Colon)));

            let prev_size = size;
            size = if line == end_line {
                let key_last = match colon {
                    Some(k) => self.last_token(&element[..k]),
                    None => Some(last),
                };
                key_last.map_or(0, |k| {
                    (self.tokens[k].end().0 - self.tokens[first].pos.0) as usize
                })
            } else {
                0
            };

            let mut use_ff = true;
            if prev_size > 0 && size > 0 {
                if count == 0 || (prev_size <= 40 && size <= 40) {
                    use_ff = false;
                } else {
                    let geomean = (lnsum / count as f64).exp();
                    let ratio = size as f64 / geomean;
                    use_ff = 2.5 * ratio <= 1.0 || 2.5 <= ratio;
                }
            }

            if line > prev_end_line {
                if i == 0 {
                    prev_break = Some(0);
                } else {
                    let skipped = prev_break.map_or(true, |b| b + 1 < i);
                    let section = use_ff || skipped;
                    if section {
                        self.out.sections.insert(first);
                    }
                    prev_break = Some(i);
                    if section || line - prev_end_line > 1 {
                        lnsum = 0.0;
                        count = 0;
                    }
                }
            }

            if let (Some(k), true) = (colon, size > 0) {
                if let Item::Tok(t) = element[k] {
                    self.out.pair_colons.insert(t);
                }
            }
            if size > 0 {
                lnsum += (size as f64).ln();
                count += 1;
            }
            prev_end_line = end_line;
        }
    }
}

fn build_tree(ops: &[(usize, u8)], next: &mut usize, min_prec: u8) -> Node {
    let mut left = Node::Leaf(*next);
    while *next < ops.len() && ops[*next].1 >= min_prec {
        let (op, prec) = ops[*next];
        *next += 1;
        let right = build_tree(ops, next, prec + 1);
        left = Node::Binary {
            op,
            prec,
            left: Box::new(left),
            right: Box::new(right),
        };
    }
    left
}

fn diff_prec(node: &Node, prec: u8) -> usize {
    match node {
        Node::Binary { prec: p, .. } if *p == prec => 0,
        _ => 1,
    }
}

// ---- emission ----

#[derive(Debug, Clone, Copy)]
enum Last {
    Start,
    Token { line: usize },
    Comment { line: usize, line_comment: bool },
}

#[derive(Debug, Clone, Copy)]
struct OpenBracket {
    token: usize,
    out_line: usize,
    counted: bool,
}

struct Printer<'a> {
    file: &'a File,
    tokens: &'a [Token],
    layout: &'a Layout,
    analysis: &'a Analysis,
    decl_breaks: HashMap<usize, usize>,
    out: Vec<Line>,
    keys: Vec<Option<&'a str>>,
    cur: Line,
    cur_key: Option<&'a str>,
    at_line_start: bool,
    stack: Vec<OpenBracket>,
    last: Last,
    last_token: Option<usize>,
    last_token_line: usize,
    force_newline: bool,
    min_newlines: usize,
    top_gap: bool,
}

impl<'a> Printer<'a> {
    fn new(file: &'a File, analysis: &'a Analysis) -> Self {
        Self {
            file,
            tokens: &file.tokens,
            layout: &file.layout,
            analysis,
            decl_breaks: decl_breaks(file),
            out: Vec::new(),
            keys: Vec::new(),
            cur: Line::new(0),
            cur_key: None,
            at_line_start: true,
            stack: Vec::new(),
            last: Last::Start,
            last_token: None,
            last_token_line: 0,
            force_newline: false,
            min_newlines: 0,
            top_gap: false,
        }
    }

    fn line(&self, pos: Pos) -> usize {
        self.file.line(pos)
    }

    fn emit(&mut self) {
        let (file, tokens) = (self.file, self.tokens);
        let mut comments: Vec<(&Comment, bool, bool)> = Vec::new();
        for (_, group) in file.comments.iter() {
            let n = group.list.len();
            comments.extend(group.list.iter().enumerate().map(|(i, c)| (c, i == 0, i + 1 < n)));
        }

        let mut ci = 0;
        for (idx, tok) in tokens.iter().enumerate() {
            match tok.kind {
                TokenKind::Semicolon { implicit: true } => continue,
                TokenKind::Eof => break,
                _ => {}
            }
            if let Some(&min) = self.decl_breaks.get(&idx) {
                self.min_newlines = min;
                self.top_gap = true;
            }
            while ci < comments.len() && comments[ci].0.slash < tok.pos {
                self.comment(&comments, ci, Some(idx));
                ci += 1;
            }
            self.token(idx);
        }
        while ci < comments.len() {
            self.comment(&comments, ci, None);
            ci += 1;
        }
    }

    fn breaks_before(&mut self, start_line: usize, comment: bool) -> usize {
        let (prev_line, after_line_comment) = match self.last {
            Last::Start => {
                self.min_newlines = 0;
                self.top_gap = false;
                self.force_newline = false;
                return 0;
            }
            Last::Token { line } => (line, false),
            Last::Comment { line, line_comment } => (line, line_comment),
        };
        let mut nl = start_line.saturating_sub(prev_line).min(2);
        if after_line_comment || self.force_newline {
            nl = nl.max(1);
        }
        if comment && self.top_gap && nl > 0 && self.stack.is_empty() {
            nl = (nl + 1).min(2);
        }
        nl = nl.max(self.min_newlines);
        self.min_newlines = 0;
        self.top_gap = false;
        self.force_newline = false;
        nl
    }

    fn comment(&mut self, comments: &[(&Comment, bool, bool)], i: usize, next: Option<usize>) {
        let (comment, starts_group, more_in_group) = comments[i];
        let next_line = next.map(|t| self.line(self.tokens[t].pos));

        if comment.synthetic {
            let anchor_line = if more_in_group {
                self.line(comments[i + 1].0.slash)
            } else {
                next_line.unwrap_or_else(|| self.line(comment.slash) + 1)
            };
            let mut nl = self.breaks_before(anchor_line, true);
            if !matches!(self.last, Last::Start) {
                nl = nl.max(1);
            }
            // keep a new doc group apart from a comment sharing the
            // declaration's line, or the two would read back as one group
            if starts_group && matches!(self.last, Last::Comment { line, .. } if line >= anchor_line) {
                nl = 2;
            }
            if nl > 0 {
                self.new_line(nl, None);
                self.cur.indent = self.comment_indent(comment, next);
            }
            self.push_text(&comment.text);
            self.last = Last::Comment {
                line: anchor_line.saturating_sub(1),
                line_comment: true,
            };
            return;
        }

        let start_line = self.line(comment.slash);
        let end_line = self.line(comment.end() - 1);
        // a comment trailing the previous token stays on its line; pending
        // declaration breaks apply to whatever follows it
        let trailing = match self.last {
            Last::Token { line } => line == start_line,
            Last::Comment {
                line,
                line_comment: false,
            } => line == start_line,
            _ => false,
        };
        let nl = if trailing && !self.force_newline {
            0
        } else {
            self.breaks_before(start_line, true)
        };
        if nl > 0 {
            self.new_line(nl, None);
            self.cur.indent = self.comment_indent(comment, next);
        } else if !self.at_line_start {
            let following_line = if more_in_group {
                Some(self.line(comments[i + 1].0.slash))
            } else {
                next_line
            };
            let ends_line = comment.is_line() || following_line.map_or(true, |l| l > end_line);
            if ends_line {
                let cells = match self.last {
                    Last::Token { .. } => self
                        .last_token
                        .and_then(|t| self.layout.comment_cells.get(&t).copied())
                        .unwrap_or(1)
                        .max(1),
                    _ => 1,
                };
                for _ in 0..cells {
                    self.cur.cells.push(String::new());
                }
            } else {
                self.push_str(" ");
            }
        }
        self.push_text(&comment.text);
        self.last = Last::Comment {
            line: end_line,
            line_comment: comment.is_line(),
        };
    }

    /// Comments on their own line above a `case` or label line up with it.
    fn comment_indent(&self, comment: &Comment, next: Option<usize>) -> usize {
        let indent = self.cur.indent;
        let Some(next) = next else {
            return indent;
        };
        if !self.layout.outdent.contains(&next) {
            return indent;
        }
        let (_, comment_col) = self.file.lines.position(comment.slash);
        let (_, token_col) = self.file.lines.position(self.tokens[next].pos);
        if comment_col <= token_col {
            indent.saturating_sub(1)
        } else {
            indent
        }
    }

    fn token(&mut self, idx: usize) {
        let tokens = self.tokens;
        let tok = &tokens[idx];
        if tok.kind == (TokenKind::Semicolon { implicit: false })
            && !self.layout.header_semis.contains(&idx)
        {
            self.separator(idx);
            return;
        }

        let start_line = self.line(tok.pos);
        let mut nl = self.breaks_before(start_line, false);
        if nl == 0 && self.closes_broken_block(idx) {
            nl = 1;
        }
        if nl > 0 {
            self.new_line(nl, Some(idx));
        } else if !self.at_line_start {
            let mut cells = self.layout.cells.get(&idx).copied().unwrap_or(0);
            if self
                .last_token
                .is_some_and(|p| self.analysis.pair_colons.contains(&p))
                && matches!(self.last, Last::Token { .. })
            {
                cells += 1;
            }
            if cells > 0 {
                for _ in 0..cells {
                    self.cur.cells.push(String::new());
                }
            } else if self.needs_space(idx) {
                self.push_str(" ");
            }
        }
        self.push_text(&tok.text);

        match tok.kind {
            TokenKind::Op(op) if op.is_open() => self.stack.push(OpenBracket {
                token: idx,
                out_line: self.out.len(),
                counted: false,
            }),
            TokenKind::Op(op) if op.is_close() => {
                self.stack.pop();
            }
            _ => {}
        }
        self.last = Last::Token {
            line: self.line(tok.end() - 1),
        };
        self.last_token = Some(idx);
        self.last_token_line = self.out.len();
    }

    /// An explicit `;` between statements: dropped at the end of a line,
    /// kept inside a one-line block, otherwise turned into a line break.
    fn separator(&mut self, idx: usize) {
        let line = self.line(self.tokens[idx].pos);
        let next = self.tokens[idx + 1..]
            .iter()
            .find(|t| !t.is_implicit_semicolon());
        let Some(next) = next else {
            return;
        };
        let ends_line = matches!(
            next.kind,
            TokenKind::Eof | TokenKind::Op(Op::RBrace | Op::RParen)
        ) || self.line(next.pos) > line;
        if ends_line {
            return;
        }
        let one_line_group = self
            .stack
            .last()
            .is_some_and(|open| open.out_line == self.out.len());
        if one_line_group {
            self.push_str(";");
            self.last_token = Some(idx);
            self.last_token_line = self.out.len();
        } else {
            self.force_newline = true;
        }
    }

    fn push_str(&mut self, s: &str) {
        if let Some(cell) = self.cur.cells.last_mut() {
            cell.push_str(s);
        } else {
            self.cur.cells.push(s.to_string());
        }
        self.at_line_start = false;
    }

    /// Append text that may span several source lines; continuation lines
    /// are kept verbatim.
    fn push_text(&mut self, text: &str) {
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            self.push_str(first);
        }
        for part in parts {
            self.push_line();
            self.cur = Line {
                indent: 0,
                cells: vec![part.to_string()],
                verbatim: true,
                section: false,
            };
        }
        self.at_line_start = false;
    }

    fn push_line(&mut self) {
        let line = std::mem::replace(&mut self.cur, Line::new(0));
        self.out.push(line);
        self.keys.push(self.cur_key.take());
    }

    fn new_line(&mut self, nl: usize, first: Option<usize>) {
        let finishing = self.out.len();
        if let Some(open) = self
            .stack
            .iter_mut()
            .rev()
            .find(|open| open.out_line == finishing)
        {
            open.counted = true;
        }
        let continuation = self.continuation(finishing);
        self.push_line();
        for _ in 1..nl {
            self.out.push(Line {
                cells: Vec::new(),
                ..Line::default()
            });
            self.keys.push(None);
        }
        self.cur = Line::new(self.indent_for(first) + continuation);
        if let Some(t) = first {
            let layout = self.layout;
            self.cur.section = self.analysis.sections.contains(&t);
            self.cur_key = layout.import_specs.get(&t).map(String::as_str);
        }
        self.at_line_start = true;
    }

    fn indent_for(&self, first: Option<usize>) -> usize {
        let mut levels = self.stack.iter().filter(|open| open.counted).count();
        if let Some(t) = first {
            if let Some(top) = self.stack.last() {
                if top.counted && self.analysis.partner[top.token] == Some(t) {
                    levels -= 1;
                }
            }
            if self.layout.outdent.contains(&t) {
                levels = levels.saturating_sub(1);
            }
        }
        levels
    }

    /// One extra level when the finished line ended in an operator that
    /// continues the expression on the next line.
    fn continuation(&self, finishing: usize) -> usize {
        let Some(t) = self.last_token else {
            return 0;
        };
        if self.last_token_line != finishing {
            return 0;
        }
        let continues = match self.tokens[t].kind {
            TokenKind::Op(_) if self.analysis.binary[t] => true,
            TokenKind::Op(Op::Period) => true,
            TokenKind::Op(Op::Comma) => self
                .stack
                .last()
                .map_or(true, |open| self.layout.block_braces.contains(&open.token)),
            TokenKind::Op(op) => op.is_assign(),
            _ => false,
        };
        match self.stack.last() {
            Some(open) if open.out_line == finishing => 0,
            _ => usize::from(continues),
        }
    }

    /// The `}` of a statement block whose body no longer fits on the line
    /// of its `{`.
    fn closes_broken_block(&self, idx: usize) -> bool {
        let Some(open) = self.stack.last() else {
            return false;
        };
        self.tokens[idx].is_op(Op::RBrace)
            && self.analysis.partner[open.token] == Some(idx)
            && self.layout.block_braces.contains(&open.token)
            && self.out.len() > open.out_line
    }

    fn brace_padded(&self, open: usize) -> bool {
        self.layout.block_braces.contains(&open) || self.layout.type_braces.contains(&open)
    }

    fn in_index(&self, t: usize) -> bool {
        self.analysis.enclosing[t].is_some_and(|open| self.tokens[open].is_op(Op::LBrack))
    }

    /// Infix `<-` (a send or `chan<-`) takes blanks; a receive does not.
    fn arrow_is_infix(&self, t: usize) -> bool {
        if self.layout.prefix_ops.contains(&t) || t == 0 {
            return false;
        }
        let before = &self.tokens[t - 1];
        before.is_keyword(Keyword::Chan) || before.ends_operand()
    }

    fn needs_space(&self, n: usize) -> bool {
        let Some(p) = self.last_token else {
            return false;
        };
        if matches!(self.last, Last::Comment { .. }) {
            return true;
        }
        if self.layout.spaced.contains(&n) {
            return true;
        }
        let a = self.analysis;
        let (pt, nt) = (&self.tokens[p], &self.tokens[n]);

        match nt.kind {
            TokenKind::Op(
                Op::Comma | Op::RParen | Op::RBrack | Op::Period | Op::Inc | Op::Dec | Op::Ellipsis,
            )
            | TokenKind::Semicolon { .. } => return false,
            TokenKind::Op(Op::RBrace) => {
                return !pt.is_op(Op::LBrace)
                    && a.partner[n].is_some_and(|open| self.brace_padded(open));
            }
            TokenKind::Op(Op::Colon) => {
                return a.slice_blanks.contains(&n) && !pt.is_op(Op::LBrack);
            }
            _ => {}
        }
        match pt.kind {
            TokenKind::Op(Op::LParen | Op::LBrack | Op::Period | Op::Ellipsis) => return false,
            TokenKind::Op(Op::LBrace) => return self.brace_padded(p),
            TokenKind::Op(Op::Comma) | TokenKind::Semicolon { .. } => return true,
            TokenKind::Op(Op::Colon) => return a.slice_blanks.contains(&p) || !self.in_index(p),
            _ => {}
        }
        if a.binary[p] {
            return !a.compact[p];
        }
        if a.binary[n] {
            return !a.compact[n];
        }
        if matches!(pt.kind, TokenKind::Op(op) if op.is_assign())
            || matches!(nt.kind, TokenKind::Op(op) if op.is_assign())
        {
            return true;
        }
        if pt.is_op(Op::Arrow) {
            return self.arrow_is_infix(p);
        }
        if nt.is_op(Op::Arrow) {
            return !pt.is_keyword(Keyword::Chan);
        }
        if matches!(pt.kind, TokenKind::Op(op) if op.is_unary()) {
            return false;
        }
        if matches!(nt.kind, TokenKind::Op(op) if op.is_unary()) {
            return !pt.is_op(Op::RBrack);
        }
        let closes_operand = |t: &Token| {
            t.kind == TokenKind::Ident
                || t.kind.is_literal()
                || matches!(t.kind, TokenKind::Op(Op::RParen | Op::RBrack | Op::RBrace))
        };
        match nt.kind {
            TokenKind::Op(Op::LParen) => {
                return match pt.kind {
                    TokenKind::Keyword(Keyword::Func) => false,
                    TokenKind::Keyword(_) => true,
                    _ => !closes_operand(pt),
                };
            }
            TokenKind::Op(Op::LBrack) => {
                return match pt.kind {
                    TokenKind::Keyword(Keyword::Map) => false,
                    TokenKind::Keyword(_) => true,
                    _ => !closes_operand(pt),
                };
            }
            TokenKind::Op(Op::LBrace) => {
                if self.layout.block_braces.contains(&n) {
                    return true;
                }
                if self.layout.type_braces.contains(&n) {
                    let close = a.partner[n].unwrap_or(n);
                    return self.line(nt.pos) != self.line(self.tokens[close].pos);
                }
                return false;
            }
            _ => {}
        }
        !pt.is_op(Op::RBrack)
    }

    fn finish(mut self) -> String {
        self.push_line();
        while self.out.last().is_some_and(|l| l.cells.iter().all(String::is_empty)) {
            self.out.pop();
            self.keys.pop();
        }
        let lines = sort_imports(std::mem::take(&mut self.out), &self.keys);
        align::render(&lines)
    }
}

/// Minimum line breaks before each top-level declaration: a blank line when
/// the keyword changes or the declaration has a doc comment.
fn decl_breaks(file: &File) -> HashMap<usize, usize> {
    let mut breaks = HashMap::new();
    let mut prev = None;
    for decl in &file.decls {
        let Ok(idx) = file.tokens.binary_search_by_key(&decl.pos(), |t| t.pos) else {
            continue;
        };
        let kind = file.tokens[idx].kind;
        let min = if prev != Some(kind) || decl.doc().is_some() {
            2
        } else {
            1
        };
        breaks.insert(idx, min);
        prev = Some(kind);
    }
    breaks
}

/// Sort runs of consecutive import spec lines by path and drop exact
/// duplicates.
fn sort_imports(lines: Vec<Line>, keys: &[Option<&str>]) -> Vec<Line> {
    let mut out = Vec::with_capacity(lines.len());
    let mut run: Vec<(&str, Line)> = Vec::new();
    for (line, key) in lines.into_iter().zip(keys.iter().copied()) {
        match key {
            Some(key) => run.push((key, line)),
            None => {
                flush_import_run(&mut run, &mut out);
                out.push(line);
            }
        }
    }
    flush_import_run(&mut run, &mut out);
    out
}

fn flush_import_run(run: &mut Vec<(&str, Line)>, out: &mut Vec<Line>) {
    run.sort_by(|a, b| a.0.cmp(b.0));
    run.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1);
    out.extend(run.drain(..).map(|(_, line)| line));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;

    fn fmt(src: &str) -> String {
        print(&parse_file(src).unwrap())
    }

    fn assert_stable(src: &str) {
        assert_eq!(fmt(src), src);
    }

    #[test]
    fn normalizes_indentation_and_blank_lines() {
        let src = "\n\t\t\tpackage hello\n\t\t\t\n\t\t\tfunc HelloFunc() {\n\t\t\t\tfmt.Println(\"hello\")\n\t\t\t}\n\t\t\t";
        assert_eq!(
            fmt(src),
            "package hello\n\nfunc HelloFunc() {\n\tfmt.Println(\"hello\")\n}\n"
        );
    }

    #[test]
    fn collapses_blank_runs() {
        let src = "package p\n\n\n\nvar a = 1\n\n\n\nvar b = 2\n";
        assert_eq!(fmt(src), "package p\n\nvar a = 1\n\nvar b = 2\n");
    }

    #[test]
    fn binary_spacing() {
        assert_stable(
            "package p\n\nfunc f() {\n\tx := a*b + c\n\ty := x[i+1]\n\tz := f(a+b, c)\n\tw := g(a + b)\n\tok := i < len(s)-1 && !done\n\ts = s[lo : hi+1]\n\ts = s[:n]\n\tq := -x + *p\n}\n",
        );
    }

    #[test]
    fn compacts_by_depth() {
        let src = "package p\n\nfunc f() {\n\tx := a * b + c\n\ty := x[i + 1]\n}\n";
        assert_eq!(
            fmt(src),
            "package p\n\nfunc f() {\n\tx := a*b + c\n\ty := x[i+1]\n}\n"
        );
    }

    #[test]
    fn types_and_signatures() {
        assert_stable(
            "package p\n\nfunc (s *Server) Handle(ctx context.Context, reqs []*Request, opts ...Option) (map[string]int, error) {\n\tvar ch <-chan int\n\tvar out chan<- []byte\n\tf := func(x int) bool { return x > 0 }\n\treturn nil, nil\n}\n",
        );
    }

    #[test]
    fn value_group_alignment() {
        let src = "package p\n\nvar (\n\ta = 1 // one\n\tlonger int = 2\n\tc string\n)\n";
        assert_eq!(
            fmt(src),
            "package p\n\nvar (\n\ta          = 1 // one\n\tlonger int = 2\n\tc      string\n)\n"
        );
    }

    #[test]
    fn struct_alignment() {
        let src = "package p\n\ntype T struct {\n\tName string `json:\"name\"`\n\tID int `json:\"id\"` // key\n\tio.Reader\n}\n";
        assert_eq!(
            fmt(src),
            "package p\n\ntype T struct {\n\tName string `json:\"name\"`\n\tID   int    `json:\"id\"` // key\n\tio.Reader\n}\n"
        );
    }

    #[test]
    fn trailing_comment_alignment() {
        let src = "package p\n\nfunc f() {\n\tx := 1 // a\n\tlonger := 2 // b\n}\n";
        assert_eq!(
            fmt(src),
            "package p\n\nfunc f() {\n\tx := 1      // a\n\tlonger := 2 // b\n}\n"
        );
    }

    #[test]
    fn key_value_alignment() {
        let src = "package p\n\nvar m = map[string]int{\n\t\"a\": 1,\n\t\"bbb\": 2,\n}\n";
        assert_eq!(
            fmt(src),
            "package p\n\nvar m = map[string]int{\n\t\"a\":   1,\n\t\"bbb\": 2,\n}\n"
        );
    }

    #[test]
    fn switch_and_labels() {
        assert_stable(
            "package p\n\nfunc f(x int) {\nloop:\n\tfor {\n\t\tswitch x {\n\t\tcase 1, 2:\n\t\t\tbreak loop\n\t\tdefault:\n\t\t\tx++\n\t\t}\n\t}\n}\n",
        );
    }

    #[test]
    fn if_else_and_headers() {
        assert_stable(
            "package p\n\nfunc f() {\n\tif err := g(); err != nil {\n\t\treturn\n\t} else if x {\n\t\th()\n\t} else {\n\t\tk()\n\t}\n\tfor i := 0; i < n; i++ {\n\t}\n}\n",
        );
    }

    #[test]
    fn semicolons() {
        let src = "package p\n\nfunc f() { a(); b() }\n\nfunc g() {\n\ta(); b();\n}\n";
        assert_eq!(
            fmt(src),
            "package p\n\nfunc f() { a(); b() }\n\nfunc g() {\n\ta()\n\tb()\n}\n"
        );
    }

    #[test]
    fn multiline_call_and_composite() {
        assert_stable(
            "package p\n\nfunc f() {\n\tfoo(a,\n\t\tb)\n\txs := []T{\n\t\t{A: 1},\n\t\t{A: 2},\n\t}\n\tx := a +\n\t\tb\n}\n",
        );
    }

    #[test]
    fn import_sorting() {
        let src = "package p\n\nimport (\n\t\"os\"\n\t\"fmt\"\n\n\tz \"github.com/z\"\n\t\"github.com/a\"\n)\n";
        assert_eq!(
            fmt(src),
            "package p\n\nimport (\n\t\"fmt\"\n\t\"os\"\n\n\t\"github.com/a\"\n\tz \"github.com/z\"\n)\n"
        );
    }

    #[test]
    fn comments_kept_in_place() {
        assert_stable(
            "// Package p does things.\npackage p\n\n/* block */\nvar x = 1\n\nfunc f() {\n\t// inside\n\tg() /* inline */\n}\n\n// trailing file comment\n",
        );
    }

    #[test]
    fn raw_string_kept_verbatim() {
        assert_stable("package p\n\nvar s = `line one\n  line two`\n");
    }

    #[test]
    fn generics() {
        assert_stable(
            "package p\n\ntype Number interface {\n\t~int | ~float64\n}\n\nfunc Sum[T Number](xs []T) T {\n\tvar s T\n\treturn s\n}\n\nvar l = List[int]{}\n",
        );
    }
}
