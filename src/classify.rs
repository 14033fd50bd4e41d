//! Which declarations need documentation, and what to call them.

use crate::ast::{FuncDecl, GenDecl, GenDeclKind, Spec};
use crate::token::Pos;

/// Placeholder name for `var`/`const` groups with several specs.
pub const BLOCK_NAME: &str = "This block";

#[derive(Debug, Clone, Copy)]
pub enum DeclRef<'a> {
    Func(&'a FuncDecl),
    Gen(&'a GenDecl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// The name a placeholder comment starts with.
    pub name: String,
    /// Where the declaration starts; placeholders go just before it.
    pub pos: Pos,
}

/// Decide whether a declaration must carry a doc comment.
///
/// Functions and methods qualify by their own name. `var` and `const`
/// declarations qualify when any spec declares an exported name; a lone
/// spec is called by that name and a group is called "This block". `type`
/// declarations are always called by their first exported type name.
pub fn classify(decl: DeclRef<'_>) -> Option<Classified> {
    match decl {
        DeclRef::Func(func) => func.name.is_exported().then(|| Classified {
            name: func.name.name.clone(),
            pos: func.func_pos,
        }),
        DeclRef::Gen(gen) => {
            let name = match gen.kind {
                GenDeclKind::Const | GenDeclKind::Var => exported_value_name(&gen.specs)?,
                GenDeclKind::Type => exported_type_name(&gen.specs)?,
                GenDeclKind::Import => return None,
            };
            Some(Classified {
                name,
                pos: gen.kw_pos,
            })
        }
    }
}

fn exported_value_name(specs: &[Spec]) -> Option<String> {
    let first = specs.iter().find_map(|spec| match spec {
        Spec::Value(value) => value.names.iter().find(|name| name.is_exported()),
        _ => None,
    })?;
    if specs.len() == 1 {
        Some(first.name.clone())
    } else {
        Some(BLOCK_NAME.to_string())
    }
}

fn exported_type_name(specs: &[Spec]) -> Option<String> {
    specs.iter().find_map(|spec| match spec {
        Spec::Type(ty) if ty.name.is_exported() => Some(ty.name.name.clone()),
        _ => None,
    })
}
