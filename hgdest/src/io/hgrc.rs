//! Repo-local Mercurial configuration (`.hg/hgrc`).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{WriteError, io_err};

/// Location of the repo-local config inside a checkout.
pub fn hgrc_path(checkout_dir: &Path) -> PathBuf {
    checkout_dir.join(".hg").join("hgrc")
}

/// Rewrite `.hg/hgrc` so the default path is `url`.
///
/// The whole file is replaced on every write; nothing else is kept in it.
pub fn write_default_path(checkout_dir: &Path, url: &str) -> Result<(), WriteError> {
    let path = hgrc_path(checkout_dir);
    let contents = format!("[paths]\ndefault = {url}\n");
    write_atomic(&path, &contents)?;
    debug!(path = %path.display(), "wrote default path");
    Ok(())
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), WriteError> {
    let parent = path
        .parent()
        .ok_or_else(|| WriteError::execution(format!("hgrc path missing parent {}", path.display())))?;
    fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents).map_err(|e| io_err(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| io_err(path, e))?;
    Ok(())
}
