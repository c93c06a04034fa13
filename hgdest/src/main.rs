//! Mercurial destination writer.
//!
//! Synchronizes a transformed working directory into a Mercurial repository:
//! pull, reset, reconcile, commit, push. Configuration lives in `hgdest.toml`;
//! checkouts are cached under `cache_dir`, one per destination URL.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, Local};
use clap::{Parser, Subcommand};
use hgdest::console::TracingConsole;
use hgdest::core::types::{OriginRef, OriginRevision, TransformResult};
use hgdest::destination::HgDestination;
use hgdest::exit_codes;
use hgdest::io::config::{DEFAULT_CONFIG_FILE, DestinationConfig, load_config, write_config};
use hgdest::io::registry::RepoRegistry;
use hgdest::{WriteError, logging};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "hgdest",
    version,
    about = "Write transformed trees into a Mercurial repository"
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log progress to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default configuration for a destination URL.
    Init {
        /// Destination repository URL.
        #[arg(long)]
        url: String,
        /// Overwrite an existing configuration file.
        #[arg(short, long)]
        force: bool,
    },
    /// Synchronize a working directory into the destination and print the effect as JSON.
    Write(WriteArgs),
    /// Check that `git credential fill` resolves credentials for the destination.
    Credential {
        /// URL to look up instead of the configured destination.
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(clap::Args)]
struct WriteArgs {
    /// Directory whose contents become the destination's next revision.
    #[arg(long)]
    workdir: PathBuf,
    /// Commit author, `Name <email>`.
    #[arg(long)]
    author: String,
    /// Commit message summary; existing trailer labels are kept.
    #[arg(long)]
    summary: String,
    /// Commit timestamp (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    timestamp: Option<DateTime<FixedOffset>>,
    /// Origin revision label, e.g. `GitOrigin-RevId=abc123`.
    #[arg(long, value_parser = parse_origin)]
    origin: Option<OriginRevision>,
    /// Origin change ids this write carries (repeatable).
    #[arg(long = "change")]
    changes: Vec<String>,
    /// Continue when the fetch reference does not exist in the destination.
    #[arg(long)]
    force: bool,
    /// Delete the cached checkout before writing.
    #[arg(long)]
    fresh: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("{:#}", err);
        let code = err
            .downcast_ref::<WriteError>()
            .map_or(exit_codes::INVALID, |e| exit_codes::for_kind(e.kind()));
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init { url, force } => cmd_init(&cli.config, url, force),
        Command::Write(args) => cmd_write(&cli.config, args),
        Command::Credential { url } => cmd_credential(&cli.config, url),
    }
}

fn cmd_init(path: &Path, url: String, force: bool) -> Result<()> {
    if !force && path.exists() {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &DestinationConfig::for_url(url))?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_write(path: &Path, args: WriteArgs) -> Result<()> {
    let mut cfg = load_config(path)?;
    cfg.force |= args.force;
    let destination = HgDestination::new(cfg)?;
    let cfg = destination.config();

    let registry = RepoRegistry::new(&cfg.cache_dir, cfg.hg_options());
    if args.fresh {
        registry.evict(&cfg.url)?;
    }
    let handle = registry.handle_for(&cfg.url)?;
    let mut repo = handle
        .lock()
        .map_err(|_| anyhow::anyhow!("repository lock poisoned"))?;

    let transform = TransformResult {
        workdir: args.workdir,
        author: args.author,
        timestamp: args
            .timestamp
            .unwrap_or_else(|| Local::now().fixed_offset()),
        summary: args.summary,
        origin_revision: args.origin,
        changes: args.changes.into_iter().map(OriginRef::new).collect(),
    };

    let effect = destination
        .new_writer(TracingConsole)
        .write(&mut *repo, &transform)?;
    info!(revision = %effect.destination_ref.id, "pushed");
    let payload = serde_json::to_string_pretty(&effect).context("serialize effect json")?;
    println!("{payload}");
    Ok(())
}

fn cmd_credential(path: &Path, url: Option<String>) -> Result<()> {
    let cfg = match url {
        Some(url) => DestinationConfig::for_url(url),
        None => load_config(path)?,
    };
    cfg.validate()?;
    let cwd = std::env::current_dir().context("resolve current directory")?;
    let creds = cfg.git_credential().fill(&cwd, &cfg.url)?;
    println!("{}", creds.username());
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(raw).map_err(|e| format!("invalid RFC 3339 timestamp: {e}"))
}

fn parse_origin(raw: &str) -> Result<OriginRevision, String> {
    let (label_name, value) = raw
        .split_once('=')
        .ok_or_else(|| "expected LABEL=VALUE".to_string())?;
    if label_name.trim().is_empty() || value.trim().is_empty() {
        return Err("label and value must be non-empty".to_string());
    }
    Ok(OriginRevision {
        label_name: label_name.trim().to_string(),
        value: value.trim().to_string(),
    })
}
