//! Read, annotate and re-print files.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;

use crate::ast::File;
use crate::error::{Error, Result};
use crate::parser::parse_file;
use crate::printer;
use crate::walk::walk_file;

/// Parse `src` and give every exported declaration a doc comment.
pub fn add_comments(path: &Path, src: &str) -> Result<File> {
    let mut file = parse_file(src).map_err(|error| Error::Parse {
        path: path.to_path_buf(),
        error,
    })?;
    walk_file(&mut file);
    file.comments.reindex();
    Ok(file)
}

/// Annotate `files` in order. With `write` each file is overwritten in
/// place; otherwise the printed sources go to `out` back to back.
///
/// Every file is read before any is parsed, and the first failure stops the
/// batch. Files already written stay written.
pub fn process<W: Write>(write: bool, files: &[PathBuf], out: &mut W) -> Result<()> {
    let mut sources = Vec::with_capacity(files.len());
    for path in files {
        let src = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.clone(),
            source,
        })?;
        sources.push(src);
    }

    for (path, src) in files.iter().zip(&sources) {
        let file = add_comments(path, src)?;
        let added = file.comments.comments().filter(|c| c.synthetic).count();
        debug!("{}: {added} placeholder(s)", path.display());
        let text = printer::print(&file);

        if write {
            let write_err = |source| Error::Write {
                path: path.clone(),
                source,
            };
            let mut target = OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(path)
                .map_err(write_err)?;
            target.write_all(text.as_bytes()).map_err(write_err)?;
        } else {
            out.write_all(text.as_bytes()).map_err(|source| Error::Write {
                path: PathBuf::from("<stdout>"),
                source,
            })?;
        }
    }
    Ok(())
}
