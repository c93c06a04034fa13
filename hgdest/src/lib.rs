//! Mercurial destination writer for a code-migration pipeline.
//!
//! Given a working directory produced by an upstream transformation, this crate
//! synchronizes its contents into a Mercurial checkout, commits, and pushes.
//! The architecture keeps the same split throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (tree diff classification, commit
//!   message trailers, effect records, the write state machine). No I/O.
//! - **[`io`]**: Side-effecting operations (`hg` and `git credential`
//!   subprocesses, filesystem snapshots, reconciliation, configuration).
//!   Version control access goes through [`io::repository::RepositoryHandle`]
//!   so orchestration can run against a fake in tests.
//!
//! [`writer::SyncWriter`] coordinates the two to implement one write.

pub mod console;
pub mod core;
pub mod destination;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod writer;

pub use error::{ErrorKind, WriteError};
