use async_trait::async_trait;
use poller_core::config::PollerConfig;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::PageError;
use crate::interval::TimeRange;
use crate::token_client::{endpoint_url, AccessToken};

/// One page of activity records plus the link to the following page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityPage {
    pub activities: Vec<Value>,
    pub next: Option<Url>,
}

/// Paginated activity listing.
#[async_trait]
pub trait ActivityApi: Send + Sync {
    /// URL of the first page for `window`.
    fn first_page(&self, window: &TimeRange) -> Result<Url, PageError>;

    /// Fetches the page at `url` using `token`.
    async fn fetch_page(&self, token: &AccessToken, url: &Url) -> Result<ActivityPage, PageError>;
}

/// HTTP client for `{api_base}/v1/environments/{id}/activities`.
#[derive(Clone)]
pub struct ActivityClient {
    http: reqwest::Client,
    activities_url: Url,
    page_limit: u32,
}

impl ActivityClient {
    pub fn new(http: reqwest::Client, config: &PollerConfig) -> Result<Self, PageError> {
        let activities_url = endpoint_url(
            config.api_base_url.clone(),
            &[
                "v1",
                "environments",
                config.credentials.environment_id.as_str(),
                "activities",
            ],
        )?;

        Ok(Self {
            http,
            activities_url,
            page_limit: config.page_limit,
        })
    }
}

/// `createdat` filter selecting `[start, end)`.
pub fn created_at_filter(window: &TimeRange) -> String {
    format!(
        "createdat ge \"{}\" and createdat lt \"{}\"",
        window.start, window.end
    )
}

#[async_trait]
impl ActivityApi for ActivityClient {
    fn first_page(&self, window: &TimeRange) -> Result<Url, PageError> {
        let mut url = self.activities_url.clone();
        url.query_pairs_mut()
            .append_pair("filter", &created_at_filter(window))
            .append_pair("limit", &self.page_limit.to_string());
        Ok(url)
    }

    async fn fetch_page(&self, token: &AccessToken, url: &Url) -> Result<ActivityPage, PageError> {
        let response = self
            .http
            .get(url.clone())
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .header(reqwest::header::AUTHORIZATION, token.authorization_header())
            .send()
            .await
            .map_err(|err| PageError::Http(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PageError::AuthRejected { status });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PageError::UnexpectedStatus { status, body });
        }

        let payload: PagePayload = response
            .json()
            .await
            .map_err(|err| PageError::Decode(err.to_string()))?;
        payload.try_into()
    }
}

#[derive(Debug, Deserialize)]
struct PagePayload {
    #[serde(rename = "_embedded", default)]
    embedded: Option<EmbeddedActivities>,
    #[serde(rename = "_links", default)]
    links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedActivities {
    #[serde(default)]
    activities: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    next: Option<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: Option<String>,
}

impl TryFrom<PagePayload> for ActivityPage {
    type Error = PageError;

    fn try_from(value: PagePayload) -> Result<Self, Self::Error> {
        let next = value
            .links
            .and_then(|links| links.next)
            .and_then(|link| link.href)
            .filter(|href| !href.trim().is_empty())
            .map(|href| Url::parse(&href))
            .transpose()?;

        Ok(Self {
            activities: value
                .embedded
                .map(|embedded| embedded.activities)
                .unwrap_or_default(),
            next,
        })
    }
}
