//! Tracing initialisation for evalmy binaries.
//!
//! The `evalmy` CLI prints result JSON on stdout and is meant to be piped
//! into other tools, so every log line is written to stderr instead.
//! [`init_tracing`] installs the global subscriber; only the first call in a
//! process takes effect.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Initialise the global tracing subscriber.
///
/// * `json`: emit newline-delimited JSON log lines.
/// * `level`: default verbosity when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let stderr_layer = if json {
        stderr_layer.json().boxed()
    } else {
        stderr_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .ok();
}
