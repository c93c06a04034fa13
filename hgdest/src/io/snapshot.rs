//! Temporary snapshot of a checkout, used as the diff baseline.

use std::path::Path;

use tempfile::TempDir;
use tracing::debug;

use crate::error::{WriteError, io_err};
use crate::io::repository::RepositoryHandle;

/// Name prefix of snapshot directories created next to the workdir.
pub const SNAPSHOT_PREFIX: &str = ".hgdest-snapshot-";

/// Archived copy of a checkout's tracked files.
///
/// The directory is removed when the value is dropped, on every exit path.
/// [`Snapshot::close`] removes it eagerly and reports cleanup failures.
#[derive(Debug)]
pub struct Snapshot {
    dir: TempDir,
}

impl Snapshot {
    /// Archive `repo` into a fresh directory created beside `workdir`.
    ///
    /// Sharing the workdir's parent keeps the snapshot on the same filesystem
    /// and outside both trees being diffed.
    pub fn create<R: RepositoryHandle + ?Sized>(
        repo: &R,
        workdir: &Path,
    ) -> Result<Self, WriteError> {
        let parent = match workdir.parent() {
            Some(parent) => parent.to_path_buf(),
            None => std::env::temp_dir(),
        };
        let dir = tempfile::Builder::new()
            .prefix(SNAPSHOT_PREFIX)
            .tempdir_in(&parent)
            .map_err(|e| io_err(&parent, e))?;
        debug!(snapshot = %dir.path().display(), "archiving checkout");
        repo.snapshot(dir.path())?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn close(self) -> Result<(), WriteError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| io_err(path, e))
    }
}
