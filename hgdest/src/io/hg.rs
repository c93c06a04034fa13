//! Mercurial adapter.
//!
//! Every operation is a bounded `hg` subprocess run inside the checkout with
//! `HGPLAIN=1`, so output is stable regardless of the user's configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::io::process::{CommandOutput, run_command_with_timeout};
use crate::io::repository::{RepoError, RepositoryHandle};

pub const DEFAULT_HG_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// How to invoke `hg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HgOptions {
    pub binary: String,
    /// Upper bound for any single `hg` invocation.
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl Default for HgOptions {
    fn default() -> Self {
        Self {
            binary: "hg".to_string(),
            timeout: DEFAULT_HG_TIMEOUT,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

/// A local Mercurial repository driven through the `hg` binary.
#[derive(Debug, Clone)]
pub struct HgRepository {
    dir: PathBuf,
    options: HgOptions,
}

impl HgRepository {
    pub fn new(dir: impl Into<PathBuf>, options: HgOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.dir.join(".hg").is_dir()
    }

    /// Create the directory and an empty repository in it.
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn init(&self) -> Result<(), RepoError> {
        fs::create_dir_all(&self.dir).map_err(|source| RepoError::Io {
            path: self.dir.clone(),
            source,
        })?;
        debug!("initializing repository");
        self.run_checked(&["init"])?;
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), RepoError> {
        if self.is_initialized() {
            return Ok(());
        }
        self.init()
    }

    fn run_checked(&self, args: &[&str]) -> Result<CommandOutput, RepoError> {
        let output = self.run_raw(args)?;
        if !output.status.success() {
            let stderr = output.stderr_lossy();
            return Err(RepoError::Command {
                command: args.join(" "),
                stderr: stderr.trim().to_string(),
                exit_code: output.status.code(),
            });
        }
        Ok(output)
    }

    fn run_raw(&self, args: &[&str]) -> Result<CommandOutput, RepoError> {
        let mut cmd = Command::new(&self.options.binary);
        cmd.args(args).current_dir(&self.dir).env("HGPLAIN", "1");
        let output = run_command_with_timeout(
            cmd,
            None,
            self.options.timeout,
            self.options.output_limit_bytes,
        )
        .map_err(|source| RepoError::Io {
            path: self.dir.clone(),
            source,
        })?;
        if output.timed_out {
            return Err(RepoError::Timeout {
                command: args.join(" "),
                timeout_secs: self.options.timeout.as_secs(),
            });
        }
        Ok(output)
    }
}

impl RepositoryHandle for HgRepository {
    fn checkout_dir(&self) -> &Path {
        &self.dir
    }

    #[instrument(skip_all, fields(url = %url, reference = %reference))]
    fn pull(&mut self, url: &str, reference: &str) -> Result<(), RepoError> {
        self.ensure_initialized()?;
        debug!("pulling");
        match self.run_checked(&["pull", "--force", "--rev", reference, url]) {
            Ok(_) => Ok(()),
            Err(err) if err.stderr().is_some_and(is_unknown_revision) => {
                warn!("reference not found in remote");
                Err(RepoError::CannotResolveReference {
                    reference: reference.to_string(),
                    url: url.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(skip_all, fields(reference = %reference))]
    fn clean_update(&mut self, reference: &str) -> Result<(), RepoError> {
        debug!("updating working copy");
        self.run_checked(&["update", "--clean", "--rev", reference])?;
        // `update --clean` leaves untracked files behind (including files added by an
        // aborted write), so drop them too.
        self.run_checked(&["--config", "extensions.purge=", "purge", "--all"])?;
        Ok(())
    }

    #[instrument(skip_all, fields(dest = %dest.display()))]
    fn snapshot(&self, dest: &Path) -> Result<(), RepoError> {
        let dest = dest.to_string_lossy();
        self.run_checked(&["archive", "--type", "files", dest.as_ref()])?;
        Ok(())
    }

    #[instrument(skip_all, fields(subcommand = args.first().copied().unwrap_or_default()))]
    fn run(&mut self, args: &[&str]) -> Result<String, RepoError> {
        let output = self.run_checked(args)?;
        Ok(output.stdout_lossy())
    }

    #[instrument(skip_all, fields(reference = %reference))]
    fn identify(&self, reference: &str) -> Result<String, RepoError> {
        let output = self.run_checked(&["identify", "--debug", "--id", "--rev", reference])?;
        parse_identify(&output.stdout_lossy()).ok_or_else(|| RepoError::Command {
            command: format!("identify --rev {reference}"),
            stderr: "empty revision id".to_string(),
            exit_code: output.status.code(),
        })
    }
}

fn is_unknown_revision(stderr: &str) -> bool {
    stderr.contains("unknown revision")
}

/// Extract the global id from `hg identify --debug --id` output.
///
/// A trailing `+` marks a dirty working copy and is not part of the id.
fn parse_identify(stdout: &str) -> Option<String> {
    let id = stdout.split_whitespace().next()?.trim_end_matches('+');
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}
