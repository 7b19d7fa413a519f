use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use poller_core::config::PollerConfig;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::activity_client::ActivityClient;
use crate::error::{FetchError, IngestError};
use crate::fetcher::ActivityFetcher;
use crate::interval::TimeRange;
use crate::scheduler::WindowScheduler;
use crate::sink::RecordSink;
use crate::status::StatusStore;
use crate::token_client::TokenClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedWindow {
    pub window: TimeRange,
    pub records: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedWindow {
    pub window: TimeRange,
    pub reason: String,
}

/// What a single run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Window enqueued by the scheduler at the start of the run, if any.
    pub scheduled: Option<TimeRange>,
    pub completed: Vec<CompletedWindow>,
    pub failed: Vec<FailedWindow>,
    /// Windows not attempted because the run deadline had passed.
    pub skipped: Vec<TimeRange>,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn records(&self) -> u64 {
        self.completed.iter().map(|done| done.records).sum()
    }
}

/// One ingestion run: enqueue the next window, then drain every requested
/// window in FIFO order, persisting after each transition.
pub struct IngestionLoop<S: RecordSink> {
    store: StatusStore,
    scheduler: WindowScheduler,
    fetcher: ActivityFetcher,
    sink: S,
    run_deadline: Option<Duration>,
}

impl<S: RecordSink> IngestionLoop<S> {
    pub fn new(
        store: StatusStore,
        scheduler: WindowScheduler,
        fetcher: ActivityFetcher,
        sink: S,
    ) -> Self {
        Self {
            store,
            scheduler,
            fetcher,
            sink,
            run_deadline: None,
        }
    }

    /// Wires the HTTP clients, store and scheduler described by `config`.
    pub fn from_config(config: &PollerConfig, sink: S) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| IngestError::Client(err.to_string()))?;
        let tokens = TokenClient::new(http.clone(), config)
            .map_err(|err| IngestError::Client(err.to_string()))?;
        let api = ActivityClient::new(http, config)
            .map_err(|err| IngestError::Client(err.to_string()))?;
        let fetcher = ActivityFetcher::new(Arc::new(tokens), Arc::new(api), config.max_auth_failures);

        Ok(Self::new(
            StatusStore::new(config.status_path.clone()),
            WindowScheduler::new(config.lookback),
            fetcher,
            sink,
        )
        .with_run_deadline(config.run_deadline))
    }

    pub fn with_run_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.run_deadline = deadline;
        self
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Runs once as of `now`.
    ///
    /// Only status-layer failures are returned as errors; a failed window is
    /// logged, left requested and reported in the summary.
    pub async fn run(&mut self, now: DateTime<Utc>) -> Result<RunSummary, IngestError> {
        let span = info_span!("run", run_id = %Uuid::new_v4());
        self.run_inner(now).instrument(span).await
    }

    async fn run_inner(&mut self, now: DateTime<Utc>) -> Result<RunSummary, IngestError> {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        let mut status = self.store.load_or_default()?;
        if let Some(window) = self.scheduler.next_window(Some(&status), now) {
            if status.add_request(window.clone()) {
                info!(%window, "requested new window");
            }
            self.store.save(&status)?;
            summary.scheduled = Some(window);
        }

        let mut status = self.store.load_or_default()?;
        let pending = status.requested.clone();
        info!(pending = pending.len(), "processing requested windows");

        for (index, window) in pending.iter().enumerate() {
            let remaining = match self.run_deadline {
                Some(deadline) => {
                    let left = deadline.saturating_sub(started.elapsed());
                    if left.is_zero() {
                        warn!(
                            skipped = pending.len() - index,
                            "run deadline reached; leaving remaining windows for the next run"
                        );
                        summary.skipped.extend(pending[index..].iter().cloned());
                        break;
                    }
                    Some(left)
                }
                None => None,
            };

            match self.fetch_window(window, remaining).await {
                Ok(records) => {
                    status.promote(window);
                    self.store.save(&status)?;
                    info!(%window, records, "window finished");
                    summary.completed.push(CompletedWindow {
                        window: window.clone(),
                        records,
                    });
                }
                Err(err) => {
                    error!(%window, error = %err, "window failed; it stays requested");
                    summary.failed.push(FailedWindow {
                        window: window.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            completed = summary.completed.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped.len(),
            records = summary.records(),
            "run complete"
        );
        Ok(summary)
    }

    async fn fetch_window(
        &mut self,
        window: &TimeRange,
        limit: Option<Duration>,
    ) -> Result<u64, FetchError> {
        self.sink.open_window(window)?;
        let drained = drain(&self.fetcher, &mut self.sink, window);
        let outcome = match limit {
            Some(limit) => tokio::time::timeout(limit, drained)
                .await
                .unwrap_or(Err(FetchError::DeadlineExceeded)),
            None => drained.await,
        };
        let closed = self.sink.close_window();
        let records = outcome?;
        closed?;
        Ok(records)
    }
}

async fn drain<S: RecordSink>(
    fetcher: &ActivityFetcher,
    sink: &mut S,
    window: &TimeRange,
) -> Result<u64, FetchError> {
    let pages = fetcher.fetch(window);
    futures::pin_mut!(pages);

    let mut records = 0u64;
    while let Some(page) = pages.next().await {
        let page = page?;
        sink.write_page(&page)?;
        records += page.len() as u64;
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use poller_core::time::format_timestamp;
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use tempfile::tempdir;
    use url::Url;

    use super::*;
    use crate::activity_client::{ActivityApi, ActivityPage};
    use crate::error::{PageError, TokenError};
    use crate::status::Status;
    use crate::token_client::{AccessToken, TokenSource};

    struct StaticTokens;

    #[async_trait]
    impl TokenSource for StaticTokens {
        async fn fetch_token(&self) -> Result<AccessToken, TokenError> {
            Ok(AccessToken::new("Bearer", "tok"))
        }
    }

    /// One page per window, keyed by window start. Unknown windows fail.
    struct WindowApi {
        pages: HashMap<String, Vec<Value>>,
    }

    #[async_trait]
    impl ActivityApi for WindowApi {
        fn first_page(&self, window: &TimeRange) -> Result<Url, PageError> {
            let mut url = Url::parse("https://api.test/activities")?;
            url.query_pairs_mut().append_pair("start", &window.start);
            Ok(url)
        }

        async fn fetch_page(
            &self,
            _token: &AccessToken,
            url: &Url,
        ) -> Result<ActivityPage, PageError> {
            let start = url
                .query_pairs()
                .find(|(key, _)| key == "start")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default();
            match self.pages.get(&start) {
                Some(records) => Ok(ActivityPage {
                    activities: records.clone(),
                    next: None,
                }),
                None => Err(PageError::UnexpectedStatus {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    body: String::new(),
                }),
            }
        }
    }

    /// Captures output and the persisted status seen at each window start.
    struct ProbeSink {
        store: StatusStore,
        output: Vec<u8>,
        snapshots: Vec<Status>,
    }

    impl RecordSink for ProbeSink {
        fn open_window(&mut self, _window: &TimeRange) -> io::Result<()> {
            let seen = self.store.load().unwrap_or_default();
            self.snapshots.push(seen);
            self.output.push(b'[');
            Ok(())
        }

        fn write_page(&mut self, records: &[Value]) -> io::Result<()> {
            for record in records {
                serde_json::to_writer(&mut self.output, record)?;
            }
            Ok(())
        }

        fn close_window(&mut self) -> io::Result<()> {
            self.output.extend_from_slice(b"]\n");
            Ok(())
        }
    }

    fn ts(minute: u32) -> String {
        format_timestamp(Utc.with_ymd_and_hms(2024, 5, 14, 10, minute, 0).unwrap())
    }

    fn range(from: u32, to: u32) -> TimeRange {
        TimeRange::new(ts(from), ts(to))
    }

    fn build(
        store: StatusStore,
        pages: HashMap<String, Vec<Value>>,
    ) -> IngestionLoop<ProbeSink> {
        let fetcher = ActivityFetcher::new(Arc::new(StaticTokens), Arc::new(WindowApi { pages }), 20);
        let sink = ProbeSink {
            store: store.clone(),
            output: Vec::new(),
            snapshots: Vec::new(),
        };
        IngestionLoop::new(
            store,
            WindowScheduler::new(Duration::from_secs(300)),
            fetcher,
            sink,
        )
    }

    #[tokio::test]
    async fn first_run_requests_and_finishes_lookback_window() {
        let dir = tempdir().expect("temp dir");
        let store = StatusStore::new(dir.path().join("status.json"));
        let pages = HashMap::from([(ts(0), vec![json!({"id": "a"})])]);
        let mut ingestion = build(store.clone(), pages);

        let now = Utc.with_ymd_and_hms(2024, 5, 14, 10, 5, 30).unwrap();
        let summary = ingestion.run(now).await.expect("run");

        assert_eq!(summary.scheduled, Some(range(0, 5)));
        assert_eq!(summary.records(), 1);
        assert!(summary.is_clean());
        let status = store.load().expect("persisted");
        assert!(status.requested.is_empty());
        assert_eq!(status.finished, vec![range(0, 5)]);
    }

    #[tokio::test]
    async fn failed_window_stays_requested_and_others_continue() {
        let dir = tempdir().expect("temp dir");
        let store = StatusStore::new(dir.path().join("status.json"));
        store
            .save(&Status {
                requested: vec![range(0, 5), range(5, 10)],
                finished: vec![],
            })
            .expect("seed");
        // Nothing served for the first window.
        let pages = HashMap::from([(ts(5), vec![]), (ts(10), vec![json!({"id": 1})])]);
        let mut ingestion = build(store.clone(), pages);

        let now = Utc.with_ymd_and_hms(2024, 5, 14, 10, 15, 0).unwrap();
        let summary = ingestion.run(now).await.expect("run");

        assert_eq!(summary.scheduled, Some(range(10, 15)));
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].window, range(0, 5));
        assert_eq!(summary.completed.len(), 2);

        let status = store.load().expect("persisted");
        assert_eq!(status.requested, vec![range(0, 5)]);
        assert_eq!(status.finished, vec![range(5, 15)]);

        let output = String::from_utf8(ingestion.into_sink().output).expect("utf8");
        assert_eq!(output, "[]\n[]\n[{\"id\":1}]\n");
    }

    #[tokio::test]
    async fn persists_after_every_window() {
        let dir = tempdir().expect("temp dir");
        let store = StatusStore::new(dir.path().join("status.json"));
        store
            .save(&Status {
                requested: vec![range(0, 5), range(5, 10), range(10, 15)],
                finished: vec![],
            })
            .expect("seed");
        let pages = HashMap::from([(ts(0), vec![]), (ts(5), vec![]), (ts(10), vec![])]);
        let mut ingestion = build(store.clone(), pages);

        let now = Utc.with_ymd_and_hms(2024, 5, 14, 10, 15, 0).unwrap();
        let summary = ingestion.run(now).await.expect("run");
        assert_eq!(summary.scheduled, None);

        let snapshots = ingestion.into_sink().snapshots;
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[1].finished, vec![range(0, 5)]);
        assert_eq!(snapshots[1].requested, vec![range(5, 10), range(10, 15)]);
        assert_eq!(snapshots[2].finished, vec![range(0, 10)]);
        assert_eq!(snapshots[2].requested, vec![range(10, 15)]);
    }

    #[tokio::test]
    async fn expired_deadline_skips_windows() {
        let dir = tempdir().expect("temp dir");
        let store = StatusStore::new(dir.path().join("status.json"));
        let mut ingestion =
            build(store.clone(), HashMap::new()).with_run_deadline(Some(Duration::ZERO));

        let now = Utc.with_ymd_and_hms(2024, 5, 14, 10, 5, 0).unwrap();
        let summary = ingestion.run(now).await.expect("run");

        assert_eq!(summary.skipped, vec![range(0, 5)]);
        assert_eq!(store.load().expect("persisted").requested, vec![range(0, 5)]);
    }

    /// Never answers within any reasonable deadline.
    struct StalledApi;

    #[async_trait]
    impl ActivityApi for StalledApi {
        fn first_page(&self, _window: &TimeRange) -> Result<Url, PageError> {
            Ok(Url::parse("https://api.test/activities")?)
        }

        async fn fetch_page(
            &self,
            _token: &AccessToken,
            _url: &Url,
        ) -> Result<ActivityPage, PageError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ActivityPage::default())
        }
    }

    #[tokio::test]
    async fn deadline_abandons_window_in_flight() {
        let dir = tempdir().expect("temp dir");
        let store = StatusStore::new(dir.path().join("status.json"));
        let fetcher = ActivityFetcher::new(Arc::new(StaticTokens), Arc::new(StalledApi), 20);
        let sink = ProbeSink {
            store: store.clone(),
            output: Vec::new(),
            snapshots: Vec::new(),
        };
        let mut ingestion = IngestionLoop::new(
            store.clone(),
            WindowScheduler::new(Duration::from_secs(300)),
            fetcher,
            sink,
        )
        .with_run_deadline(Some(Duration::from_millis(200)));

        let started = Instant::now();
        let now = Utc.with_ymd_and_hms(2024, 5, 14, 10, 5, 0).unwrap();
        let summary = ingestion.run(now).await.expect("run");

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(summary.skipped.is_empty());
        assert!(summary.completed.is_empty());
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].window, range(0, 5));
        assert_eq!(
            summary.failed[0].reason,
            FetchError::DeadlineExceeded.to_string()
        );

        let status = store.load().expect("persisted");
        assert_eq!(status.requested, vec![range(0, 5)]);
        assert!(status.finished.is_empty());
        let output = String::from_utf8(ingestion.into_sink().output).expect("utf8");
        assert_eq!(output, "[]\n");
    }

    #[tokio::test]
    async fn unreadable_status_aborts_the_run() {
        let dir = tempdir().expect("temp dir");
        // A directory where the file should be cannot be read as a document.
        let path = dir.path().join("status.json");
        std::fs::create_dir(&path).expect("dir");
        let mut ingestion = build(StatusStore::new(&path), HashMap::new());

        let result = ingestion.run(Utc::now()).await;
        assert!(matches!(result, Err(IngestError::Status(_))));
    }
}
