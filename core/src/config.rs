//! Poster configuration.
//!
//! # Design
//! `PosterConfig` is plain data that can be built in code, deserialized from
//! JSON, or read from `METRICS_POSTER_*` environment variables. Validation of
//! the URL happens here so that a bad endpoint fails when the poster is
//! built, never on the first post.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_USER_AGENT: &str = concat!("metrics-poster/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_MAX_IN_FLIGHT: usize = 5;
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 1000;

pub const ENV_URL: &str = "METRICS_POSTER_URL";
pub const ENV_IDENTITY: &str = "METRICS_POSTER_IDENTITY";
pub const ENV_SECRET: &str = "METRICS_POSTER_SECRET";
pub const ENV_USER_AGENT: &str = "METRICS_POSTER_USER_AGENT";
pub const ENV_MAX_IN_FLIGHT: &str = "METRICS_POSTER_MAX_IN_FLIGHT";
pub const ENV_TIMEOUT_MS: &str = "METRICS_POSTER_TIMEOUT_MS";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PosterConfig {
    pub url: String,
    pub identity: String,
    pub secret: String,
    /// Sent when a caller posts with an empty user agent.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Upper bound on exchanges running at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Whole-exchange timeout enforced by the transport. `None` leaves it to
    /// the HTTP engine's defaults.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// How long `close` waits for in-flight exchanges.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_shutdown_grace_ms() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}

impl PosterConfig {
    pub fn new(url: &str, identity: &str, secret: &str) -> Self {
        Self {
            url: url.to_string(),
            identity: identity.to_string(),
            secret: secret.to_string(),
            user_agent: default_user_agent(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            request_timeout_ms: None,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from `METRICS_POSTER_*` keys resolved through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::MissingSetting(key));

        let mut config = Self::new(
            &required(ENV_URL)?,
            &required(ENV_IDENTITY)?,
            &required(ENV_SECRET)?,
        );
        if let Some(user_agent) = lookup(ENV_USER_AGENT) {
            config.user_agent = user_agent;
        }
        if let Some(raw) = lookup(ENV_MAX_IN_FLIGHT) {
            config.max_in_flight = parse_setting(ENV_MAX_IN_FLIGHT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            config.request_timeout_ms = Some(parse_setting(ENV_TIMEOUT_MS, &raw)?);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_flight == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "max_in_flight",
                value: "0".to_string(),
            });
        }
        self.parse_url().map(|_| ())
    }

    /// Parse and check the endpoint URL. Only absolute http(s) URLs are
    /// accepted.
    pub fn parse_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.url).map_err(|source| ConfigError::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::UnsupportedScheme {
                url: self.url.clone(),
                scheme: scheme.to_string(),
            }),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn parse_setting<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidSetting {
        name,
        value: raw.to_string(),
    })
}
