use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

use crate::errors::{PollerError, Result};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "POLLER_LOG";

/// Initializes the tracing subscriber used by the poller binaries.
///
/// Logs go to stderr: stdout carries the harvested records.
pub fn init_tracing(level: Option<&str>) -> Result<()> {
    let default_level = level.unwrap_or("info");
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .try_init()
        .map_err(|err| PollerError::LoggingError(err.to_string()))?;

    Ok(())
}
