//! Activity poller engine - resumable window tracking and paginated fetching.
//!
//! A run loads the persisted [`Status`], lets the [`WindowScheduler`] enqueue
//! the next window, then drains every requested window through the
//! [`ActivityFetcher`] into a [`RecordSink`], promoting windows to finished
//! as they complete.

pub mod activity_client;
pub mod error;
pub mod fetcher;
pub mod ingest;
pub mod interval;
pub mod scheduler;
pub mod sink;
pub mod status;
pub mod token_client;

pub use activity_client::{ActivityApi, ActivityClient, ActivityPage};
pub use error::{FetchError, IngestError, PageError, StatusError, TokenError};
pub use fetcher::{ActivityFetcher, PageBatch};
pub use ingest::{CompletedWindow, FailedWindow, IngestionLoop, RunSummary};
pub use interval::{contains_exact, merge_adjacent, TimeRange};
pub use scheduler::WindowScheduler;
pub use sink::{JsonArraySink, RecordSink};
pub use status::{Status, StatusStore};
pub use token_client::{AccessToken, TokenClient, TokenSource};
