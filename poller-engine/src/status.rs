//! Persisted ingestion status: which windows are pending and which are done.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StatusError;
use crate::interval::{contains_exact, merge_adjacent, TimeRange};

/// The only persisted entity. Shape on disk:
/// `{"requested": [[start, end], ...], "finished": [[start, end], ...]}`.
///
/// Both keys are required; a document missing either one is corrupt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub requested: Vec<TimeRange>,
    pub finished: Vec<TimeRange>,
}

impl Status {
    /// Queues `range` unless an identical range is already queued.
    ///
    /// Returns whether the range was added.
    pub fn add_request(&mut self, range: TimeRange) -> bool {
        if contains_exact(&self.requested, &range) {
            return false;
        }
        self.requested.push(range);
        true
    }

    /// Moves `range` from `requested` to `finished` and re-folds the whole
    /// finished list.
    pub fn promote(&mut self, range: &TimeRange) {
        self.requested.retain(|pending| pending != range);
        self.finished.push(range.clone());
        self.finished = merge_adjacent(&self.finished);
    }
}

/// JSON file holding the [`Status`].
///
/// No locking is performed: two processes sharing a path race each other.
#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
}

impl StatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the persisted status.
    pub fn load(&self) -> Result<Status, StatusError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StatusError::NotFound(self.path.clone()))
            }
            Err(source) => {
                return Err(StatusError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&contents).map_err(|source| StatusError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Like [`load`](Self::load), but a missing or corrupt document yields an
    /// empty status. Other read failures still propagate.
    pub fn load_or_default(&self) -> Result<Status, StatusError> {
        match self.load() {
            Ok(status) => Ok(status),
            Err(StatusError::NotFound(path)) => {
                info!(path = %path.display(), "no status document yet; starting fresh");
                Ok(Status::default())
            }
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "discarding unreadable status document; starting fresh");
                Ok(Status::default())
            }
            Err(err) => Err(err),
        }
    }

    /// Replaces the persisted document: the new content is written to a
    /// sibling temp file, flushed, then renamed over the old one.
    pub fn save(&self, status: &Status) -> Result<(), StatusError> {
        self.write_atomically(status)
            .map_err(|source| StatusError::PersistFailed {
                path: self.path.clone(),
                source,
            })?;
        debug!(
            path = %self.path.display(),
            requested = status.requested.len(),
            finished = status.finished.len(),
            "status persisted"
        );
        Ok(())
    }

    fn write_atomically(&self, status: &Status) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_vec(status)?;
        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)
    }
}
