//! Time ranges and the small algebra the status document relies on.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A window of activity creation timestamps, `[start, end)`.
///
/// Bounds are canonical timestamp strings (see [`poller_core::time`]) and are
/// compared textually. On disk a range is the two-element array
/// `[start, end]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// True when `start` sorts strictly before `end`.
    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }
}

impl From<(String, String)> for TimeRange {
    fn from((start, end): (String, String)) -> Self {
        Self { start, end }
    }
}

impl From<TimeRange> for (String, String) {
    fn from(range: TimeRange) -> Self {
        (range.start, range.end)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Folds ranges left to right, joining a range onto the accumulated one when
/// the accumulated `end` equals its `start`.
///
/// Only neighbours in list order are joined. Ranges that would touch after
/// sorting, or that overlap, are left as they are.
pub fn merge_adjacent(ranges: &[TimeRange]) -> Vec<TimeRange> {
    ranges.iter().fold(Vec::with_capacity(ranges.len()), |mut merged, next| {
        match merged.last_mut() {
            Some(last) if last.end == next.start => last.end = next.end.clone(),
            _ => merged.push(next.clone()),
        }
        merged
    })
}

/// True iff some element has exactly the candidate's start and end.
pub fn contains_exact(ranges: &[TimeRange], candidate: &TimeRange) -> bool {
    ranges.iter().any(|range| range == candidate)
}
