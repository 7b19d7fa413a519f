//! Activity poller: incremental, resumable harvesting of identity platform
//! activity records.
//!
//! The workspace is split into:
//!
//! * `poller-core`: configuration, region mapping, errors, timestamps and logging
//! * `poller-engine`: interval algebra, status persistence, scheduling,
//!   authenticated pagination and the ingestion loop
//! * `poller-cli`: the `activity-poller` binary

pub use poller_core::{config, errors, logging, time};
pub use poller_core::{ConfigError, Credentials, PollerConfig, Region};
pub use poller_engine::{
    ActivityFetcher, IngestError, IngestionLoop, JsonArraySink, RecordSink, RunSummary, Status,
    StatusStore, TimeRange, WindowScheduler,
};

