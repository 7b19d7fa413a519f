use std::time::Duration;

use chrono::{DateTime, Utc};
use poller_core::time::{floor_to_minute, format_timestamp, to_chrono};
use tracing::{debug, warn};

use crate::interval::TimeRange;
use crate::status::Status;

/// Decides which window, if any, a run should enqueue.
#[derive(Debug, Clone, Copy)]
pub struct WindowScheduler {
    lookback: Duration,
}

impl WindowScheduler {
    pub fn new(lookback: Duration) -> Self {
        Self { lookback }
    }

    /// Next window to request given the persisted status and the current time.
    ///
    /// The window ends at `now` floored to the minute. It starts `lookback`
    /// earlier, unless ingestion already progressed: the end of the last
    /// finished range wins over the default, and the end of the last
    /// requested range wins over both.
    pub fn next_window(&self, status: Option<&Status>, now: DateTime<Utc>) -> Option<TimeRange> {
        let end_instant = floor_to_minute(now);
        let end = format_timestamp(end_instant);
        let mut start = format_timestamp(
            end_instant
                .checked_sub_signed(to_chrono(self.lookback))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        );

        if let Some(status) = status {
            if let Some(last) = status.finished.last() {
                start = last.end.clone();
            }
            if let Some(last) = status.requested.last() {
                start = last.end.clone();
            }
        }

        if start == end {
            debug!(%end, "already caught up; nothing to request");
            return None;
        }

        let window = TimeRange::new(start, end);
        if !window.is_well_formed() {
            warn!(%window, "persisted progress is ahead of the clock; not requesting");
            return None;
        }
        Some(window)
    }
}
