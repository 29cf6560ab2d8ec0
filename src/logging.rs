//! Logging setup for the command-line binary
//!
//! Log lines go to stderr so they never mix with report output on stdout.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for a `-v` count
///
/// Insufficient-funds outcomes log at `warn`, and a default run produces
/// thousands of them, so the quiet default is `error`.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `verbosity` when set. Calling this twice
/// is harmless; the second call leaves the first subscriber in place.
pub fn init(verbosity: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .try_init();

    if installed.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}
