use thiserror::Error;

/// Result type used across the poller core crate.
pub type Result<T> = std::result::Result<T, PollerError>;

/// Failures raised while bootstrapping the process.
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("logging setup failed: {0}")]
    LoggingError(String),
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("unknown region {0:?}; expected one of NA, CA, EU, AP")]
    UnknownRegion(String),
}
