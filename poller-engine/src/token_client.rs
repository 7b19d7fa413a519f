use std::fmt;

use async_trait::async_trait;
use poller_core::config::{Credentials, PollerConfig};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::TokenError;

/// Bearer-style credential returned by the token endpoint.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

impl AccessToken {
    pub fn new(token_type: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
        }
    }

    /// Value for the `Authorization` header: `"{token_type} {access_token}"`.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Anything able to hand out a fresh credential.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken, TokenError>;
}

/// Client-credentials exchange against `{auth_base}/{environment_id}/as/token`.
#[derive(Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    token_url: Url,
    credentials: Credentials,
    scope: String,
}

impl TokenClient {
    pub fn new(http: reqwest::Client, config: &PollerConfig) -> Result<Self, TokenError> {
        let token_url = endpoint_url(
            config.auth_base_url.clone(),
            &[config.credentials.environment_id.as_str(), "as", "token"],
        )?;

        Ok(Self {
            http,
            token_url,
            credentials: config.credentials.clone(),
            scope: config.scope.clone(),
        })
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }
}

#[async_trait]
impl TokenSource for TokenClient {
    async fn fetch_token(&self) -> Result<AccessToken, TokenError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("scope", self.scope.as_str()),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(self.token_url.clone())
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .form(&form)
            .send()
            .await
            .map_err(|err| TokenError::Http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::UnexpectedStatus { status, body });
        }

        let token: AccessToken = response
            .json()
            .await
            .map_err(|err| TokenError::Decode(err.to_string()))?;
        debug!(token_type = %token.token_type, "obtained access token");
        Ok(token)
    }
}

/// Appends `segments` to the path of `base`, percent-encoding each one.
pub(crate) fn endpoint_url(mut base: Url, segments: &[&str]) -> Result<Url, url::ParseError> {
    base.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);
    Ok(base)
}
