//! One synchronization of a transformed workdir into a Mercurial destination.

use tracing::{Span, debug, info, instrument, warn};

use crate::console::Console;
use crate::core::effect::to_effect;
use crate::core::message::{build_change_message, origin_labels};
use crate::core::state::{WriteProgress, WriteState};
use crate::core::types::{DestinationEffect, TransformResult};
use crate::error::WriteError;
use crate::io::config::DestinationConfig;
use crate::io::hgrc::write_default_path;
use crate::io::reconcile::reconcile;
use crate::io::repository::{RepoError, RepositoryHandle};

/// Writes transform results into the configured destination.
///
/// A writer holds no repository state of its own; every call to
/// [`SyncWriter::write`] drives the handle it is given from a fresh pull.
#[derive(Debug, Clone)]
pub struct SyncWriter<C> {
    config: DestinationConfig,
    console: C,
}

impl<C: Console> SyncWriter<C> {
    pub fn new(config: DestinationConfig, console: C) -> Self {
        Self { config, console }
    }

    pub fn config(&self) -> &DestinationConfig {
        &self.config
    }

    /// Pull, reset, reconcile, commit, push, and report the pushed revision.
    ///
    /// Any failure aborts the remaining steps. A failure after the commit
    /// leaves an unpushed local revision behind; the next write's clean update
    /// moves the working copy off it.
    #[instrument(
        skip_all,
        fields(
            url = %self.config.url,
            workdir = %transform.workdir.display(),
            state = tracing::field::Empty
        )
    )]
    pub fn write<R: RepositoryHandle + ?Sized>(
        &self,
        repo: &mut R,
        transform: &TransformResult,
    ) -> Result<DestinationEffect, WriteError> {
        self.config.validate()?;
        let mut progress = WriteProgress::default();
        match self.run_steps(repo, transform, &mut progress) {
            Ok(effect) => {
                info!(revision = %effect.destination_ref.id, "write finished");
                Ok(effect)
            }
            Err(err) => {
                let reached = progress.reached();
                if let Err(invalid) = progress.abort() {
                    debug!(error = %invalid, "write already terminal");
                }
                Span::current().record("state", tracing::field::display(progress.state()));
                warn!(reached = %reached, error = %err, "write aborted");
                if reached.has_local_commit() {
                    self.console.warn(&format!(
                        "Local commit in {} was not pushed to {}",
                        repo.checkout_dir().display(),
                        self.config.url
                    ));
                }
                Err(err)
            }
        }
    }

    fn run_steps<R: RepositoryHandle + ?Sized>(
        &self,
        repo: &mut R,
        transform: &TransformResult,
        progress: &mut WriteProgress,
    ) -> Result<DestinationEffect, WriteError> {
        let cfg = &self.config;

        self.console
            .progress(&format!("Hg Destination: Fetching {} {}", cfg.url, cfg.fetch));
        self.pull(repo)?;
        advance(progress, WriteState::Pulled)?;

        self.console
            .progress(&format!("Hg Destination: Checking out {}", cfg.fetch));
        repo.clean_update(&cfg.fetch)?;
        advance(progress, WriteState::Clean)?;

        write_default_path(repo.checkout_dir(), &cfg.url)?;

        self.console
            .progress("Hg Destination: Adding all files");
        let summary = reconcile(repo, &transform.workdir)?;
        debug!(
            added = summary.added.len(),
            modified = summary.modified.len(),
            deleted = summary.deleted.len(),
            "staged changes"
        );
        advance(progress, WriteState::Reconciled)?;

        self.console.progress("Hg Destination: Creating a local commit");
        let labels = origin_labels(transform, &cfg.origin_label_separator);
        let message = build_change_message(&transform.summary, &labels).to_string();
        let date = transform.timestamp.to_rfc2822();
        repo.run(&[
            "commit",
            "--user",
            &transform.author,
            "--date",
            &date,
            "-m",
            &message,
        ])?;
        advance(progress, WriteState::Committed)?;

        self.console.progress(&format!(
            "Hg Destination: Pushing to {} {}",
            cfg.url, cfg.push
        ));
        repo.run(&["push", "--rev", &cfg.push, &cfg.url])?;
        advance(progress, WriteState::Pushed)?;

        let tip = repo.identify("tip")?;
        advance(progress, WriteState::Done)?;
        Ok(to_effect(&tip, transform, &cfg.url))
    }

    fn pull<R: RepositoryHandle + ?Sized>(&self, repo: &mut R) -> Result<(), WriteError> {
        let cfg = &self.config;
        match repo.pull(&cfg.url, &cfg.fetch) {
            Ok(()) => Ok(()),
            Err(RepoError::CannotResolveReference { .. }) if cfg.force => {
                self.console.warn(&format!(
                    "Hg Destination: '{}' doesn't exist in '{}'. Continuing because of --force",
                    cfg.fetch, cfg.url
                ));
                Ok(())
            }
            Err(RepoError::CannotResolveReference { .. }) => Err(WriteError::validation(format!(
                "Hg Destination: '{}' doesn't exist in '{}'. \
                 Use --force flag if you want to push anyway",
                cfg.fetch, cfg.url
            ))),
            Err(err) => Err(err.into()),
        }
    }
}

fn advance(progress: &mut WriteProgress, to: WriteState) -> Result<(), WriteError> {
    progress
        .advance(to)
        .map_err(|e| WriteError::execution_from("write state machine violated", e))?;
    Span::current().record("state", tracing::field::display(to));
    Ok(())
}
