//! Credential lookup through `git credential fill`.
//!
//! The password only ever lives in [`UserPassword`]. Nothing in this module
//! logs the request, the helper's stdout, or the parsed fields.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::error::WriteError;
use crate::io::process::run_command_with_timeout;

pub const DEFAULT_CREDENTIAL_TIMEOUT: Duration = Duration::from_secs(30);

const OUTPUT_LIMIT_BYTES: usize = 64 * 1024;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z][a-zA-Z0-9+.-]*)://([^/?#]*)([^?#]*)").expect("url regex")
});

/// A username and password pair. `Debug` never shows the password.
#[derive(Clone, PartialEq, Eq)]
pub struct UserPassword {
    username: String,
    password: String,
}

impl UserPassword {
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The secret itself. Do not log or format it.
    pub fn password_be_careful(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for UserPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPassword")
            .field("username", &self.username)
            .field("password", &"(hidden)")
            .finish()
    }
}

/// Runs `git credential fill` with prompting disabled.
#[derive(Debug, Clone)]
pub struct GitCredential {
    git_binary: String,
    timeout: Duration,
    env: BTreeMap<String, String>,
}

impl GitCredential {
    pub fn new(git_binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            git_binary: git_binary.into(),
            timeout,
            env: BTreeMap::new(),
        }
    }

    /// Extra environment for the helper process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Look up credentials for `url`, running the helper in `cwd` so repo-local
    /// git configuration applies.
    #[instrument(skip_all, fields(cwd = %cwd.display()))]
    pub fn fill(&self, cwd: &Path, url: &str) -> Result<UserPassword, WriteError> {
        let request = credential_request(url)?;

        let mut cmd = Command::new(&self.git_binary);
        cmd.args(["credential", "fill"])
            .current_dir(cwd)
            .envs(&self.env)
            // Prompts go to the terminal, never to our pipes.
            .env("GIT_ASKPASS", "")
            .env("GIT_TERMINAL_PROMPT", "0");

        debug!(timeout_secs = self.timeout.as_secs(), "requesting credentials");
        let output = run_command_with_timeout(
            cmd,
            Some(request.as_bytes()),
            self.timeout,
            OUTPUT_LIMIT_BYTES,
        )
        .map_err(|e| WriteError::execution_from("Error getting credentials", e))?;

        if output.timed_out {
            warn!("credential helper timed out");
            return Err(WriteError::execution(format!(
                "Error getting credentials: timed out after {}s",
                self.timeout.as_secs()
            )));
        }
        if !output.status.success() {
            let stderr = output.stderr_lossy();
            if stderr.contains("could not read") {
                return Err(WriteError::validation(
                    "Interactive prompting of passwords for git is disabled, \
                     use git credential store before calling hgdest",
                ));
            }
            return Err(WriteError::execution(format!(
                "Error getting credentials:\n{}",
                stderr.trim()
            )));
        }

        let mut fields = parse_response(&output.stdout_lossy());
        let username = fields.remove("username").ok_or_else(|| {
            WriteError::execution(format!("git credentials for {url} didn't return a username"))
        })?;
        let password = fields.remove("password").ok_or_else(|| {
            WriteError::execution(format!("git credentials for {url} didn't return a password"))
        })?;
        debug!("credentials resolved");
        Ok(UserPassword { username, password })
    }
}

/// Build the `key=value` request terminated by a blank line.
fn credential_request(url: &str) -> Result<String, WriteError> {
    let caps = URL_RE
        .captures(url)
        .ok_or_else(|| WriteError::validation(format!("Cannot find the protocol for {url}")))?;
    let protocol = &caps[1];
    let authority = &caps[2];
    let path = &caps[3];

    let host_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = strip_port(host_port);
    if host.is_empty() {
        return Err(WriteError::validation(format!(
            "Cannot get credentials for {url}: missing host"
        )));
    }

    let mut request = format!("protocol={protocol}\nhost={host}\n");
    if !path.is_empty() {
        request.push_str(&format!("path={path}\n"));
    }
    request.push('\n');
    Ok(request)
}

fn strip_port(host_port: &str) -> &str {
    // Bracketed IPv6 literal: keep the brackets, drop anything after them.
    if host_port.starts_with('[') {
        return host_port
            .find(']')
            .map_or(host_port, |end| &host_port[..=end]);
    }
    host_port.split_once(':').map_or(host_port, |(host, _)| host)
}

fn parse_response(stdout: &str) -> BTreeMap<String, String> {
    stdout
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
