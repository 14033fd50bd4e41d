//! Build constraints: `//go:build` expressions and legacy `// +build` lines.

use std::sync::LazyLock;

use regex::Regex;

static RE_GO_BUILD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^//go:build(?:\s+(.*))?$").unwrap());
static RE_PLUS_BUILD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^//\s*\+build(?:\s+(.*))?$").unwrap());
static RE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\|\||&&|!|\(|\)|[A-Za-z0-9_.]+)").unwrap());
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]+$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Tag(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn eval(&self, matches: &mut impl FnMut(&str) -> bool) -> bool {
        match self {
            Expr::Tag(tag) => matches(tag),
            Expr::Not(x) => !x.eval(matches),
            Expr::And(x, y) => x.eval(matches) && y.eval(matches),
            Expr::Or(x, y) => x.eval(matches) || y.eval(matches),
        }
    }

    fn and(x: Expr, y: Expr) -> Expr {
        Expr::And(Box::new(x), Box::new(y))
    }

    fn or(x: Expr, y: Expr) -> Expr {
        Expr::Or(Box::new(x), Box::new(y))
    }
}

/// The constraint in the header of a Go source file, if any.
///
/// Only the comment block before the package clause counts. A `//go:build`
/// line wins over `// +build` lines; the latter apply only when a blank line
/// follows them.
pub fn file_constraint(src: &str) -> Result<Option<Expr>, String> {
    let mut go_build = None;
    let mut plus = Vec::new();
    let mut pending = Vec::new();
    let mut in_block = false;

    for line in src.trim_start_matches('\u{feff}').lines() {
        let line = line.trim();
        if in_block {
            in_block = !line.contains("*/");
            continue;
        }
        if line.is_empty() {
            plus.append(&mut pending);
            continue;
        }
        if line.starts_with("/*") {
            in_block = !line.contains("*/");
            continue;
        }
        if !line.starts_with("//") {
            break;
        }
        if let Some(caps) = RE_GO_BUILD.captures(line) {
            if go_build.is_none() {
                go_build = Some(caps.get(1).map_or("", |m| m.as_str()).to_string());
            }
        } else if let Some(caps) = RE_PLUS_BUILD.captures(line) {
            pending.push(caps.get(1).map_or("", |m| m.as_str()).to_string());
        }
    }

    if let Some(text) = go_build {
        return parse_go_build(&text).map(Some);
    }
    plus.iter()
        .map(|line| parse_plus_build(line))
        .try_fold(None, |acc: Option<Expr>, x| {
            let x = x?;
            Ok(Some(match acc {
                Some(acc) => Expr::and(acc, x),
                None => x,
            }))
        })
}

/// Parse the expression of a `//go:build` line.
pub fn parse_go_build(text: &str) -> Result<Expr, String> {
    let mut tokens = Vec::new();
    let mut rest = text.trim_end();
    while !rest.trim().is_empty() {
        let caps = RE_TOKEN
            .captures(rest)
            .ok_or_else(|| format!("invalid //go:build expression: {text}"))?;
        let whole = caps.get(0).map_or(0, |m| m.end());
        tokens.push(caps.get(1).map_or("", |m| m.as_str()));
        rest = &rest[whole..];
    }

    let mut parser = ExprParser { tokens, next: 0 };
    let expr = parser
        .or()
        .ok_or_else(|| format!("invalid //go:build expression: {text}"))?;
    if parser.next != parser.tokens.len() {
        return Err(format!("unexpected token in //go:build expression: {text}"));
    }
    Ok(expr)
}

/// Parse one `// +build` line: space-separated alternatives of
/// comma-separated, optionally negated tags.
pub fn parse_plus_build(text: &str) -> Result<Expr, String> {
    let mut alternatives = Vec::new();
    for clause in text.split_whitespace() {
        let mut terms = Vec::new();
        for term in clause.split(',') {
            let (negated, tag) = match term.strip_prefix('!') {
                Some(tag) => (true, tag),
                None => (false, term),
            };
            if !RE_TAG.is_match(tag) {
                return Err(format!("invalid +build tag: {term}"));
            }
            let tag = Expr::Tag(tag.to_string());
            terms.push(if negated { Expr::Not(Box::new(tag)) } else { tag });
        }
        if let Some(term) = terms.into_iter().reduce(Expr::and) {
            alternatives.push(term);
        }
    }
    alternatives
        .into_iter()
        .reduce(Expr::or)
        .ok_or_else(|| "empty +build line".to_string())
}

struct ExprParser<'a> {
    tokens: Vec<&'a str>,
    next: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.next).copied()
    }

    fn or(&mut self) -> Option<Expr> {
        let mut x = self.and()?;
        while self.peek() == Some("||") {
            self.next += 1;
            x = Expr::or(x, self.and()?);
        }
        Some(x)
    }

    fn and(&mut self) -> Option<Expr> {
        let mut x = self.not()?;
        while self.peek() == Some("&&") {
            self.next += 1;
            x = Expr::and(x, self.not()?);
        }
        Some(x)
    }

    fn not(&mut self) -> Option<Expr> {
        match self.peek()? {
            "!" => {
                self.next += 1;
                Some(Expr::Not(Box::new(self.not()?)))
            }
            "(" => {
                self.next += 1;
                let x = self.or()?;
                if self.peek() != Some(")") {
                    return None;
                }
                self.next += 1;
                Some(x)
            }
            "||" | "&&" | ")" => None,
            tag => {
                self.next += 1;
                Some(Expr::Tag(tag.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &Expr, tags: &[&str]) -> bool {
        expr.eval(&mut |tag| tags.contains(&tag))
    }

    #[test]
    fn go_build_precedence() {
        let expr = parse_go_build("linux && amd64 || darwin").unwrap();
        assert!(eval(&expr, &["linux", "amd64"]));
        assert!(eval(&expr, &["darwin"]));
        assert!(!eval(&expr, &["linux"]));
    }

    #[test]
    fn go_build_negation_and_parens() {
        let expr = parse_go_build("!windows && (arm64 || go1.18)").unwrap();
        assert!(eval(&expr, &["linux", "go1.18"]));
        assert!(!eval(&expr, &["windows", "arm64"]));
        assert!(!eval(&expr, &["linux"]));
    }

    #[test]
    fn go_build_rejects_garbage() {
        assert!(parse_go_build("linux &&").is_err());
        assert!(parse_go_build("(linux").is_err());
        assert!(parse_go_build("linux darwin").is_err());
        assert!(parse_go_build("linux $ x").is_err());
    }

    #[test]
    fn plus_build_lines() {
        let expr = parse_plus_build("linux,386 darwin,!cgo").unwrap();
        assert!(eval(&expr, &["linux", "386"]));
        assert!(eval(&expr, &["darwin"]));
        assert!(!eval(&expr, &["darwin", "cgo"]));
    }

    #[test]
    fn header_go_build() {
        let src = "// Copyright\n\n//go:build ignore\n\npackage main\n";
        let expr = file_constraint(src).unwrap().unwrap();
        assert_eq!(expr, Expr::Tag("ignore".into()));
    }

    #[test]
    fn go_build_wins_over_plus_build() {
        let src = "//go:build linux\n// +build darwin\n\npackage p\n";
        let expr = file_constraint(src).unwrap().unwrap();
        assert_eq!(expr, Expr::Tag("linux".into()));
    }

    #[test]
    fn plus_build_needs_blank_line() {
        let src = "// +build ignore\npackage p\n";
        assert_eq!(file_constraint(src).unwrap(), None);

        let src = "// +build linux\n// +build amd64\n\npackage p\n";
        let expr = file_constraint(src).unwrap().unwrap();
        assert!(eval(&expr, &["linux", "amd64"]));
        assert!(!eval(&expr, &["linux"]));
    }

    #[test]
    fn constraints_after_package_are_ignored() {
        let src = "package p\n\n//go:build ignore\n";
        assert_eq!(file_constraint(src).unwrap(), None);
    }

    #[test]
    fn block_comment_in_header() {
        let src = "/* license\n   text */\n\n//go:build cgo\n\npackage p\n";
        assert_eq!(
            file_constraint(src).unwrap(),
            Some(Expr::Tag("cgo".into()))
        );
    }
}
