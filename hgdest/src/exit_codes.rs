//! Stable exit codes for hgdest CLI commands.

use crate::error::ErrorKind;

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid configuration, arguments, or an unresolved reference without `--force`.
pub const INVALID: i32 = 1;
/// An `hg` or `git credential` command failed.
pub const EXECUTION: i32 = 2;
/// Filesystem failure (snapshot, copy, cleanup).
pub const IO: i32 = 3;

pub fn for_kind(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Validation => INVALID,
        ErrorKind::Execution => EXECUTION,
        ErrorKind::Io => IO,
    }
}
