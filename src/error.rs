use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A lexical or syntactic error at a line and column of one file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{line}:{column}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Why a package name could not be turned into a list of files.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("cannot find package \"{package}\" in any of: {searched}")]
    NotFound { package: String, searched: String },

    #[error("cannot find package \"{package}\" in: {dir}")]
    LocalNotFound { package: String, dir: String },

    #[error("{dir} is not a directory")]
    NotADirectory { dir: String },

    #[error("no buildable Go source files in {dir}")]
    NoGoFiles { dir: String },

    #[error("found packages {first} ({first_file}) and {second} ({second_file}) in {dir}")]
    MultiplePackages {
        dir: String,
        first: String,
        first_file: String,
        second: String,
        second_file: String,
    },

    #[error("invalid directory pattern for {dir}")]
    Pattern {
        dir: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to list {dir}")]
    List {
        dir: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{error}", path.display())]
    Parse { path: PathBuf, error: SyntaxError },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let err = Error::Parse {
            path: PathBuf::from("a/b.go"),
            error: SyntaxError {
                line: 3,
                column: 7,
                message: "expected declaration, found identifier x".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "a/b.go:3:7: expected declaration, found identifier x"
        );
    }

    #[test]
    fn read_error_keeps_source() {
        let err = Error::Read {
            path: PathBuf::from("x.go"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.to_string(), "failed to read x.go");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("gone"));
    }

    #[test]
    fn resolve_error_is_transparent() {
        let err: Error = ResolveError::NoGoFiles {
            dir: "empty".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "no buildable Go source files in empty");
    }
}
