//! Placeholder doc comments for exported Go declarations.
//!
//! A package name is resolved to its Go source files ([`resolve`]). Each file
//! is parsed ([`parser`]), every exported declaration without a matching doc
//! comment gets a `// <Name> needs a comment (THIS IS A PLACEHOLDER)` line
//! ([`walk`]), and the file is printed back in canonical form ([`printer`]).

pub mod align;
pub mod ast;
pub mod classify;
pub mod constraint;
pub mod error;
pub mod layout;
pub mod parser;
pub mod printer;
pub mod registry;
pub mod resolve;
pub mod rewrite;
pub mod scanner;
pub mod synthesize;
pub mod token;
pub mod walk;

pub use error::{Error, Result};
pub use resolve::{resolve, BuildContext};
pub use rewrite::{add_comments, process};
