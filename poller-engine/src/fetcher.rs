//! Walks the paginated activity listing for one window.
//!
//! ```text
//!   NeedToken ──token──▶ Fetching ──page with next──▶ Fetching
//!       ▲                   │  │
//!       └──── 401/403 ──────┘  └──page without next──▶ Done
//! ```
//!
//! A rejected credential sends the walk back to `NeedToken` with the current
//! cursor kept, so pagination resumes at the page that failed. Token failures
//! and any non-auth page failure end the walk.

use std::sync::Arc;

use futures::stream::{self, Stream};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::activity_client::ActivityApi;
use crate::error::{FetchError, PageError};
use crate::interval::TimeRange;
use crate::token_client::{AccessToken, TokenSource};

/// Records of a single page, in server order.
pub type PageBatch = Vec<Value>;

enum FetchState {
    NeedToken,
    Fetching { token: AccessToken, url: Url },
    Done,
}

struct Walk {
    window: TimeRange,
    state: FetchState,
    cursor: Option<Url>,
    auth_failures: u32,
    pages: u32,
}

/// Fetches every page of a window, refreshing the credential on demand.
#[derive(Clone)]
pub struct ActivityFetcher {
    tokens: Arc<dyn TokenSource>,
    api: Arc<dyn ActivityApi>,
    max_auth_failures: u32,
}

impl ActivityFetcher {
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        api: Arc<dyn ActivityApi>,
        max_auth_failures: u32,
    ) -> Self {
        Self {
            tokens,
            api,
            max_auth_failures,
        }
    }

    /// Lazily fetches `window`, yielding each page as soon as it arrives.
    ///
    /// The stream ends after the last page. On failure it yields a single
    /// error and then ends.
    pub fn fetch<'a>(
        &'a self,
        window: &TimeRange,
    ) -> impl Stream<Item = Result<PageBatch, FetchError>> + 'a {
        let walk = Walk {
            window: window.clone(),
            state: FetchState::NeedToken,
            cursor: None,
            auth_failures: 0,
            pages: 0,
        };

        stream::unfold(walk, move |mut walk| async move {
            let item = self.advance(&mut walk).await?;
            Some((item, walk))
        })
    }

    async fn advance(&self, walk: &mut Walk) -> Option<Result<PageBatch, FetchError>> {
        loop {
            match std::mem::replace(&mut walk.state, FetchState::Done) {
                FetchState::Done => return None,
                FetchState::NeedToken => {
                    let token = match self.tokens.fetch_token().await {
                        Ok(token) => token,
                        Err(err) => return Some(Err(FetchError::TokenFetchFailed(err))),
                    };
                    let url = match walk.cursor.clone() {
                        Some(cursor) => cursor,
                        None => match self.api.first_page(&walk.window) {
                            Ok(url) => url,
                            Err(err) => return Some(Err(FetchError::FetchFailed(err))),
                        },
                    };
                    walk.state = FetchState::Fetching { token, url };
                }
                FetchState::Fetching { token, url } => {
                    match self.api.fetch_page(&token, &url).await {
                        Ok(page) => {
                            walk.pages += 1;
                            debug!(
                                window = %walk.window,
                                page = walk.pages,
                                records = page.activities.len(),
                                more = page.next.is_some(),
                                "fetched page"
                            );
                            if let Some(next) = page.next {
                                walk.cursor = Some(next.clone());
                                walk.state = FetchState::Fetching { token, url: next };
                            }
                            return Some(Ok(page.activities));
                        }
                        Err(PageError::AuthRejected { status }) => {
                            walk.auth_failures += 1;
                            if walk.auth_failures > self.max_auth_failures {
                                return Some(Err(FetchError::TooManyAuthFailures {
                                    attempts: walk.auth_failures,
                                }));
                            }
                            warn!(
                                window = %walk.window,
                                %status,
                                attempt = walk.auth_failures,
                                "credential rejected; requesting a new one"
                            );
                            walk.state = FetchState::NeedToken;
                        }
                        Err(err) => return Some(Err(FetchError::FetchFailed(err))),
                    }
                }
            }
        }
    }
}
