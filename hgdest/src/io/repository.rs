//! Version-control access used by the writer and the reconciler.
//!
//! [`RepositoryHandle`] is the narrow seam between orchestration and the `hg`
//! binary. [`crate::io::hg::HgRepository`] shells out; tests use the in-memory
//! fake from `test_support`.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Bookkeeping file `hg archive` writes at the root of every snapshot.
pub const ARCHIVAL_FILE: &str = ".hg_archival.txt";

/// Failure signalled by a [`RepositoryHandle`].
#[derive(Debug, Error)]
pub enum RepoError {
    /// The requested reference does not exist in the remote.
    #[error("cannot resolve reference '{reference}' in {url}")]
    CannotResolveReference { reference: String, url: String },

    /// The subcommand ran and failed.
    #[error("hg {command} failed: {stderr}")]
    Command {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("hg {command} timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RepoError {
    /// Captured stderr for failed subcommands.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Command { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// A checkout that can be pulled, reset, snapshotted, and driven by subcommands.
///
/// Implementations are mutated in place and provide no internal locking: a
/// handle must not be used by two writes at once.
pub trait RepositoryHandle {
    /// Root of the working checkout.
    fn checkout_dir(&self) -> &Path;

    /// Pull `reference` from `url` into the local repository.
    fn pull(&mut self, url: &str, reference: &str) -> Result<(), RepoError>;

    /// Force the working copy to exactly `reference`, discarding local edits.
    fn clean_update(&mut self, reference: &str) -> Result<(), RepoError>;

    /// Materialize the tracked content of the working copy's parent revision into `dest`.
    fn snapshot(&self, dest: &Path) -> Result<(), RepoError>;

    /// Run an arbitrary subcommand inside the checkout, returning stdout.
    fn run(&mut self, args: &[&str]) -> Result<String, RepoError>;

    /// Resolve `reference` to a global revision id.
    fn identify(&self, reference: &str) -> Result<String, RepoError>;
}
