//! Destination configuration stored as TOML (default `hgdest.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::message::DEFAULT_LABEL_SEPARATOR;
use crate::error::WriteError;
use crate::io::credential::GitCredential;
use crate::io::hg::{DEFAULT_HG_TIMEOUT, DEFAULT_OUTPUT_LIMIT_BYTES, HgOptions};

pub const DEFAULT_CONFIG_FILE: &str = "hgdest.toml";

/// Where and how to write.
///
/// Missing fields default to values that work against a `default` branch;
/// only `url` has to be set by hand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DestinationConfig {
    /// Destination repository URL. Must carry a scheme (`https://`, `ssh://`, `file://`).
    pub url: String,

    /// Reference pulled and checked out before writing.
    pub fetch: String,

    /// Reference pushed after committing.
    pub push: String,

    /// Continue when `fetch` does not exist in the destination.
    pub force: bool,

    /// Separator between label name and value in the commit message trailer.
    pub origin_label_separator: String,

    /// Directory holding cached checkouts, one per destination URL.
    pub cache_dir: PathBuf,

    pub hg: HgConfig,

    pub credential: CredentialConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HgConfig {
    pub binary: String,
    /// Upper bound for any single `hg` invocation.
    pub command_timeout_secs: u64,
    /// Captured stdout/stderr beyond this many bytes is discarded.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialConfig {
    pub git_binary: String,
    pub timeout_secs: u64,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            fetch: "default".to_string(),
            push: "default".to_string(),
            force: false,
            origin_label_separator: DEFAULT_LABEL_SEPARATOR.to_string(),
            cache_dir: PathBuf::from(".hgdest/cache"),
            hg: HgConfig::default(),
            credential: CredentialConfig::default(),
        }
    }
}

impl Default for HgConfig {
    fn default() -> Self {
        Self {
            binary: "hg".to_string(),
            command_timeout_secs: DEFAULT_HG_TIMEOUT.as_secs(),
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            git_binary: "git".to_string(),
            timeout_secs: crate::io::credential::DEFAULT_CREDENTIAL_TIMEOUT.as_secs(),
        }
    }
}

impl DestinationConfig {
    /// Config for `url` with every other field defaulted.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), WriteError> {
        if self.url.trim().is_empty() {
            return Err(WriteError::validation("url must be set"));
        }
        if !has_scheme(&self.url) {
            return Err(WriteError::validation(format!(
                "Hg Destination: url '{}' must include a scheme such as https:// or file://",
                self.url
            )));
        }
        if self.fetch.trim().is_empty() {
            return Err(WriteError::validation("fetch reference must be non-empty"));
        }
        if self.push.trim().is_empty() {
            return Err(WriteError::validation("push reference must be non-empty"));
        }
        if self.hg.binary.trim().is_empty() {
            return Err(WriteError::validation("hg.binary must be non-empty"));
        }
        if self.hg.command_timeout_secs == 0 {
            return Err(WriteError::validation("hg.command_timeout_secs must be > 0"));
        }
        if self.hg.output_limit_bytes == 0 {
            return Err(WriteError::validation("hg.output_limit_bytes must be > 0"));
        }
        if self.credential.git_binary.trim().is_empty() {
            return Err(WriteError::validation("credential.git_binary must be non-empty"));
        }
        if self.credential.timeout_secs == 0 {
            return Err(WriteError::validation("credential.timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn hg_options(&self) -> HgOptions {
        HgOptions {
            binary: self.hg.binary.clone(),
            timeout: Duration::from_secs(self.hg.command_timeout_secs),
            output_limit_bytes: self.hg.output_limit_bytes,
        }
    }

    pub fn git_credential(&self) -> GitCredential {
        GitCredential::new(
            self.credential.git_binary.clone(),
            Duration::from_secs(self.credential.timeout_secs),
        )
    }
}

/// `scheme://...` with an RFC 3986 scheme.
pub fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Load config from a TOML file.
///
/// A missing file yields the defaults, which fail validation until `url` is set.
pub fn load_config(path: &Path) -> Result<DestinationConfig> {
    if !path.exists() {
        let cfg = DestinationConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DestinationConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &DestinationConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
