//! Applying a workdir onto a checkout through add/overwrite/remove.
//!
//! Mercurial cannot "replace the working tree with this directory", so the
//! reconciler archives the checkout, diffs the archive against the workdir, and
//! replays the difference: copy + `hg add` for new files, overwrite for
//! modified files, `hg remove` for deleted ones. Nothing is rolled back on
//! failure; the caller treats the checkout as indeterminate.

use std::fs;
use std::path::Path;

use filetime::FileTime;
use tracing::{debug, info, instrument};

use crate::core::diff::in_apply_order;
use crate::core::types::DiffOp;
use crate::error::{WriteError, io_err};
use crate::io::manifest::{DiffError, diff_trees};
use crate::io::repository::{ARCHIVAL_FILE, RepoError, RepositoryHandle};
use crate::io::snapshot::Snapshot;

/// Paths touched by one reconciliation, each in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl ReconcileSummary {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Make the checkout of `repo` match the file contents of `workdir`.
#[instrument(skip_all, fields(workdir = %workdir.display()))]
pub fn reconcile<R: RepositoryHandle + ?Sized>(
    repo: &mut R,
    workdir: &Path,
) -> Result<ReconcileSummary, WriteError> {
    let workdir = workdir.canonicalize().map_err(|e| io_err(workdir, e))?;
    let snapshot = Snapshot::create(&*repo, &workdir)?;
    let summary = stage_changes(repo, snapshot.path(), &workdir)?;
    snapshot.close()?;

    info!(
        added = summary.added.len(),
        modified = summary.modified.len(),
        deleted = summary.deleted.len(),
        "checkout reconciled"
    );
    Ok(summary)
}

fn stage_changes<R: RepositoryHandle + ?Sized>(
    repo: &mut R,
    snapshot: &Path,
    workdir: &Path,
) -> Result<ReconcileSummary, WriteError> {
    let entries = diff_trees(snapshot, workdir).map_err(diff_error)?;
    let checkout = repo.checkout_dir().to_path_buf();
    let mut summary = ReconcileSummary::default();

    for entry in in_apply_order(&entries) {
        let source = workdir.join(&entry.path);
        let target = checkout.join(&entry.path);
        match entry.op {
            DiffOp::Add => {
                copy_entry(&source, &target)?;
                repo.run(&["add", "--", &exact_path(&entry.path)])?;
                summary.added.push(entry.path.clone());
            }
            DiffOp::Modified => {
                copy_entry(&source, &target)?;
                summary.modified.push(entry.path.clone());
            }
            DiffOp::Delete => match repo.run(&["remove", "--", &exact_path(&entry.path)]) {
                Ok(_) => summary.deleted.push(entry.path.clone()),
                Err(err) if is_missing_archival_file(&entry.path, &err) => {
                    debug!(path = %entry.path, "archival file absent from checkout, ignoring");
                }
                Err(err) => return Err(err.into()),
            },
        }
    }
    Ok(summary)
}

/// `hg` treats file arguments as patterns (`glob:`, `re:`, `set:` ...), even
/// after `--`. The `path:` kind matches exactly one file.
fn exact_path(path: &str) -> String {
    format!("path:{path}")
}

/// The archive bookkeeping file never exists in the checkout, so removing it fails.
fn is_missing_archival_file(path: &str, err: &RepoError) -> bool {
    path == ARCHIVAL_FILE
        && err
            .stderr()
            .is_some_and(|stderr| stderr.contains("No such file or directory"))
}

fn diff_error(err: DiffError) -> WriteError {
    match err {
        DiffError::Read { path, source } => io_err(path, source),
        other => WriteError::execution_from(format!("Error computing file diff: {other}"), other),
    }
}

/// Copy `source` over `target`, keeping permissions and modification time.
fn copy_entry(source: &Path, target: &Path) -> Result<(), WriteError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let metadata = fs::symlink_metadata(source).map_err(|e| io_err(source, e))?;

    // Replace the target instead of writing through it: it may be a symlink or
    // a read-only file left by an earlier write.
    match fs::remove_file(target) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(target, e)),
    }

    if metadata.file_type().is_symlink() {
        return copy_symlink(source, target);
    }

    fs::copy(source, target).map_err(|e| io_err(target, e))?;
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_mtime(target, mtime).map_err(|e| io_err(target, e))?;
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> Result<(), WriteError> {
    let link = fs::read_link(source).map_err(|e| io_err(source, e))?;
    std::os::unix::fs::symlink(&link, target).map_err(|e| io_err(target, e))
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> Result<(), WriteError> {
    fs::copy(source, target).map_err(|e| io_err(target, e))?;
    Ok(())
}
