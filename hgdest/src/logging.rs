//! Tracing setup for the `hgdest` binary.
//!
//! The library never installs a subscriber; it only emits `tracing` events and
//! spans. Writer progress reaches users through [`crate::console::Console`],
//! whose default implementation forwards to these events.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `hgdest=info` when `verbose`, otherwise `warn`.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=hgdest=debug hgdest write --workdir out/ --author "A <a@x>" --summary "msg"
/// ```
pub fn init(verbose: bool) {
    let default = if verbose { "hgdest=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
