//! User-facing progress reporting for destination writes.
//!
//! The writer receives a [`Console`] at construction instead of reaching for a
//! global logger mid-algorithm. Tests substitute a recording console.

use tracing::{info, warn};

pub trait Console {
    /// Report a step the writer is about to perform.
    fn progress(&self, message: &str);
    /// Report a recoverable problem (e.g. a missing ref accepted under `force`).
    fn warn(&self, message: &str);
}

/// Console that forwards to `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingConsole;

impl Console for TracingConsole {
    fn progress(&self, message: &str) {
        info!(target: "hgdest::progress", "{message}");
    }

    fn warn(&self, message: &str) {
        warn!(target: "hgdest::progress", "{message}");
    }
}

impl<C: Console + ?Sized> Console for &C {
    fn progress(&self, message: &str) {
        (**self).progress(message);
    }

    fn warn(&self, message: &str) {
        (**self).warn(message);
    }
}
