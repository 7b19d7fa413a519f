use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::errors::ConfigError;

/// Scope requested during the client-credentials exchange.
pub const ACTIVITY_SCOPE: &str = "p1:read:env:activity";

pub const DEFAULT_LOOKBACK_SECS: u64 = 5 * 60;
pub const DEFAULT_MAX_AUTH_FAILURES: u32 = 20;
pub const DEFAULT_PAGE_LIMIT: u32 = 500;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Hosting region of the identity platform. Each region lives under its own
/// top-level domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    NorthAmerica,
    Canada,
    Europe,
    AsiaPacific,
}

impl Region {
    /// Domain suffix used to build the auth and api hosts.
    pub fn domain_suffix(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "com",
            Region::Canada => "ca",
            Region::Europe => "eu",
            Region::AsiaPacific => "asia",
        }
    }

    pub fn auth_base_url(&self) -> String {
        format!("https://auth.pingone.{}", self.domain_suffix())
    }

    pub fn api_base_url(&self) -> String {
        format!("https://api.pingone.{}", self.domain_suffix())
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::NorthAmerica
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NA" | "COM" => Ok(Region::NorthAmerica),
            "CA" => Ok(Region::Canada),
            "EU" => Ok(Region::Europe),
            "AP" | "ASIA" => Ok(Region::AsiaPacific),
            _ => Err(ConfigError::UnknownRegion(value.to_string())),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Region::NorthAmerica => "NA",
            Region::Canada => "CA",
            Region::Europe => "EU",
            Region::AsiaPacific => "AP",
        };
        f.write_str(code)
    }
}

/// Client credentials for the token exchange.
#[derive(Clone)]
pub struct Credentials {
    pub environment_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(
        environment_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            environment_id: environment_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("environment_id", &self.environment_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Immutable configuration threaded through the token client, the activity
/// client, the fetcher and the ingestion loop.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub credentials: Credentials,
    pub region: Region,
    pub auth_base_url: Url,
    pub api_base_url: Url,
    pub scope: String,
    pub lookback: Duration,
    pub max_auth_failures: u32,
    pub status_path: PathBuf,
    pub page_limit: u32,
    pub request_timeout: Duration,
    pub run_deadline: Option<Duration>,
}

impl PollerConfig {
    /// Builds a configuration with every optional setting at its default.
    pub fn new(credentials: Credentials, region: Region) -> Result<Self, ConfigError> {
        Ok(Self {
            credentials,
            region,
            auth_base_url: parse_url("auth base url", &region.auth_base_url())?,
            api_base_url: parse_url("api base url", &region.api_base_url())?,
            scope: ACTIVITY_SCOPE.to_string(),
            lookback: Duration::from_secs(DEFAULT_LOOKBACK_SECS),
            max_auth_failures: DEFAULT_MAX_AUTH_FAILURES,
            status_path: default_status_path(),
            page_limit: DEFAULT_PAGE_LIMIT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            run_deadline: None,
        })
    }

    /// Switches region, pointing both endpoints at that region's public hosts.
    pub fn set_region(&mut self, region: Region) -> Result<(), ConfigError> {
        self.auth_base_url = parse_url("auth base url", &region.auth_base_url())?;
        self.api_base_url = parse_url("api base url", &region.api_base_url())?;
        self.region = region;
        Ok(())
    }

    /// Loads configuration from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let credentials = Credentials::new(
            required("PINGONE_ENV_ID")?,
            required("PINGONE_CLIENT_ID")?,
            required("PINGONE_CLIENT_SECRET")?,
        );

        let region = match lookup("POLLER_REGION") {
            Some(raw) => raw.parse()?,
            None => Region::default(),
        };

        let mut config = Self::new(credentials, region)?;

        if let Some(raw) = lookup("POLLER_AUTH_URL") {
            config.auth_base_url = parse_url("POLLER_AUTH_URL", &raw)?;
        }
        if let Some(raw) = lookup("POLLER_API_URL") {
            config.api_base_url = parse_url("POLLER_API_URL", &raw)?;
        }
        if let Some(secs) = read_parsed::<u64>(&lookup, "POLLER_LOOKBACK_SECS")? {
            config.lookback = Duration::from_secs(secs);
        }
        if let Some(max) = read_parsed::<u32>(&lookup, "POLLER_MAX_AUTH_RETRIES")? {
            config.max_auth_failures = max;
        }
        if let Some(path) = lookup("POLLER_STATUS_FILE") {
            config.status_path = PathBuf::from(path);
        }
        if let Some(limit) = read_parsed::<u32>(&lookup, "POLLER_PAGE_LIMIT")? {
            config.page_limit = limit;
        }
        if let Some(secs) = read_parsed::<u64>(&lookup, "POLLER_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        config.run_deadline =
            read_parsed::<u64>(&lookup, "POLLER_RUN_DEADLINE_SECS")?.map(Duration::from_secs);

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback.as_secs() < 60 {
            return Err(ConfigError::InvalidValue {
                key: "lookback".into(),
                value: format!("{}s", self.lookback.as_secs()),
                reason: "windows are minute aligned; use at least 60 seconds".into(),
            });
        }
        if self.page_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "page_limit".into(),
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

fn read_parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                reason: err.to_string(),
            }),
        None => Ok(None),
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

/// Default location of the persisted status document.
pub fn default_status_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("activity-poller").join("status.json"))
        .unwrap_or_else(|| PathBuf::from("status.json"))
}
