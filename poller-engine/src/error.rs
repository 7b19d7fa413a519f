use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures reading or writing the persisted status document.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("no status document at {}", .0.display())]
    NotFound(PathBuf),

    #[error("status document at {} is corrupt: {}", .path.display(), .source)]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read status document at {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to persist status document at {}: {}", .path.display(), .source)]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StatusError {
    /// Missing and corrupt documents both mean "no prior state".
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StatusError::NotFound(_) | StatusError::Corrupt { .. })
    }
}

/// Token endpoint failures. All of them are terminal for the current window.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("token request failed: {0}")]
    Http(String),
    #[error("token endpoint returned unexpected status {status}: {body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode token response: {0}")]
    Decode(String),
}

/// Outcome of a single page request that did not yield a page.
#[derive(Debug, Error)]
pub enum PageError {
    /// 401 or 403: the credential is no longer accepted.
    #[error("activity endpoint rejected the credential ({status})")]
    AuthRejected { status: reqwest::StatusCode },
    #[error("invalid activity url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("activity request failed: {0}")]
    Http(String),
    #[error("activity endpoint returned unexpected status {status}: {body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode activity page: {0}")]
    Decode(String),
}

/// Reasons a window fetch is aborted.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not obtain a credential: {0}")]
    TokenFetchFailed(#[source] TokenError),

    #[error("credential rejected {attempts} times; giving up")]
    TooManyAuthFailures { attempts: u32 },

    #[error("page fetch failed: {0}")]
    FetchFailed(#[source] PageError),

    #[error("run deadline reached before the window completed")]
    DeadlineExceeded,

    #[error("failed to write records: {0}")]
    Sink(#[from] io::Error),
}

/// Errors that abort an ingestion run. Window-level failures never surface
/// here; they stay in the run summary.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("could not build HTTP client: {0}")]
    Client(String),
}
