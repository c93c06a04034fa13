//! Building file manifests from directory trees.
//!
//! Walks a tree (without following symlinks), fingerprints every file, and
//! hands the two manifests to [`crate::core::diff`]. The repository metadata
//! directory at the root (`.hg`) is not content and is skipped.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::core::diff::{Fingerprint, Manifest, diff_manifests};
use crate::core::types::DiffEntry;

const METADATA_DIR: &str = ".hg";

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("diff root {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// One root contains the other, so walking one would include the other.
    #[error("ambiguous diff roots: {} is inside {}", inner.display(), outer.display())]
    NestedRoots { outer: PathBuf, inner: PathBuf },

    #[error("walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("path is not valid UTF-8: {}", path.display())]
    NonUtf8 { path: PathBuf },

    #[error("read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Diff two directory trees: `snapshot` is the baseline, `workdir` the target.
#[instrument(skip_all, fields(snapshot = %snapshot.display(), workdir = %workdir.display()))]
pub fn diff_trees(snapshot: &Path, workdir: &Path) -> Result<Vec<DiffEntry>, DiffError> {
    check_roots(snapshot, workdir)?;
    let before = build_manifest(snapshot)?;
    let after = build_manifest(workdir)?;
    let entries = diff_manifests(&before, &after);
    debug!(
        snapshot_files = before.len(),
        workdir_files = after.len(),
        changes = entries.len(),
        "computed tree diff"
    );
    Ok(entries)
}

fn check_roots(a: &Path, b: &Path) -> Result<(), DiffError> {
    let a = canonical_dir(a)?;
    let b = canonical_dir(b)?;
    if a.starts_with(&b) {
        return Err(DiffError::NestedRoots { outer: b, inner: a });
    }
    if b.starts_with(&a) {
        return Err(DiffError::NestedRoots { outer: a, inner: b });
    }
    Ok(())
}

fn canonical_dir(path: &Path) -> Result<PathBuf, DiffError> {
    let canonical = path.canonicalize().map_err(|source| DiffError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(DiffError::NotADirectory { path: canonical });
    }
    Ok(canonical)
}

/// Fingerprint every file under `root`, keyed by `/`-separated relative path.
pub fn build_manifest(root: &Path) -> Result<Manifest, DiffError> {
    let mut manifest = Manifest::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_root_metadata(entry));

    for entry in walker {
        let entry = entry.map_err(|source| DiffError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        let key = manifest_key(&relative)?;
        let fingerprint = if file_type.is_symlink() {
            symlink_fingerprint(entry.path())?
        } else {
            file_fingerprint(entry.path())?
        };
        manifest.insert(key, fingerprint);
    }
    Ok(manifest)
}

fn is_root_metadata(entry: &walkdir::DirEntry) -> bool {
    entry.depth() == 1 && entry.file_type().is_dir() && entry.file_name() == METADATA_DIR
}

fn manifest_key(relative: &Path) -> Result<String, DiffError> {
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| DiffError::NonUtf8 {
                path: relative.to_path_buf(),
            })?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

fn file_fingerprint(path: &Path) -> Result<Fingerprint, DiffError> {
    let read_err = |source| DiffError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(read_err)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(read_err)?;
    let metadata = file.metadata().map_err(read_err)?;
    Ok(Fingerprint::File {
        digest: hex::encode(hasher.finalize()),
        executable: is_executable(&metadata),
    })
}

fn symlink_fingerprint(path: &Path) -> Result<Fingerprint, DiffError> {
    let target = fs::read_link(path).map_err(|source| DiffError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Fingerprint::Symlink {
        target: target.to_string_lossy().into_owned(),
    })
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}
