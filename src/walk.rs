//! Document-order traversal that adds placeholder docs to every eligible
//! declaration, including those nested in function bodies.

use crate::ast::{Block, Decl, Expr, File, FuncDecl, GenDecl, Spec, Stmt};
use crate::classify::{classify, DeclRef};
use crate::registry::CommentRegistry;
use crate::synthesize::ensure_doc;

pub fn walk_file(file: &mut File) {
    let File {
        decls, comments, ..
    } = file;
    for decl in decls.iter_mut() {
        match decl {
            Decl::Func(func) => visit_func(func, comments),
            Decl::Gen(gen) => visit_gen(gen, comments),
        }
    }
}

fn visit_func(func: &mut FuncDecl, comments: &mut CommentRegistry) {
    if let Some(c) = classify(DeclRef::Func(func)) {
        func.doc = ensure_doc(comments, func.doc, &c.name, c.pos);
    }
    if let Some(body) = &mut func.body {
        visit_block(body, comments);
    }
}

fn visit_gen(gen: &mut GenDecl, comments: &mut CommentRegistry) {
    if let Some(c) = classify(DeclRef::Gen(gen)) {
        gen.doc = ensure_doc(comments, gen.doc, &c.name, c.pos);
    }
    for spec in &mut gen.specs {
        if let Spec::Value(value) = spec {
            for expr in &mut value.values {
                visit_expr(expr, comments);
            }
        }
    }
}

fn visit_block(block: &mut Block, comments: &mut CommentRegistry) {
    for stmt in &mut block.stmts {
        match stmt {
            Stmt::Decl(gen) => visit_gen(gen, comments),
            Stmt::Block(inner) => visit_block(inner, comments),
            Stmt::Other(expr) => visit_expr(expr, comments),
        }
    }
}

fn visit_expr(expr: &mut Expr, comments: &mut CommentRegistry) {
    for body in &mut expr.bodies {
        visit_block(body, comments);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;

    fn placeholders(src: &str) -> Vec<String> {
        let mut file = parse_file(src).unwrap();
        walk_file(&mut file);
        file.comments.reindex();
        file.comments
            .comments()
            .filter(|c| c.synthetic)
            .map(|c| c.text.clone())
            .collect()
    }

    #[test]
    fn top_level_in_document_order() {
        let got = placeholders(
            "package p\n\nfunc B() {}\n\nvar A = 1\n\ntype c int\n\ntype D int\n",
        );
        assert_eq!(
            got,
            vec![
                "// B needs a comment (THIS IS A PLACEHOLDER)",
                "// A needs a comment (THIS IS A PLACEHOLDER)",
                "// D needs a comment (THIS IS A PLACEHOLDER)",
            ]
        );
    }

    #[test]
    fn nested_declarations_get_placeholders() {
        let src = r#"package p

func f() {
	const Limit = 3
	if true {
		var Inner = 2
		_ = Inner
	}
	run(func() {
		type Local int
	})
}

var G = func() {
	var InLiteral = 1
	_ = InLiteral
}
"#;
        let got = placeholders(src);
        assert_eq!(got.len(), 5, "Got: {got:?}");
        assert!(got[0].starts_with("// Limit "));
        assert!(got[1].starts_with("// Inner "));
        assert!(got[2].starts_with("// Local "));
        assert!(got[3].starts_with("// G "));
        assert!(got[4].starts_with("// InLiteral "));
    }

    #[test]
    fn walk_is_idempotent_on_documented_code() {
        let src = "package p\n\n// F needs a comment (THIS IS A PLACEHOLDER)\nfunc F() {}\n";
        let mut file = parse_file(src).unwrap();
        walk_file(&mut file);
        assert_eq!(file.comments.len(), 1);
        assert_eq!(file.comments.comments().count(), 1);
    }
}
