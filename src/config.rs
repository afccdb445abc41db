//! Configuration types.

use std::str::FromStr;
use std::time::Duration;

use rand::Rng;

use crate::error::ConfigError;

/// Default Graph API root.
pub const DEFAULT_GRAPH_API_BASE_URL: &str = "https://graph.facebook.com/v19.0";

/// Default private mobile API root.
pub const DEFAULT_PRIVATE_API_BASE_URL: &str = "https://i.instagram.com/api/v1";

/// Service configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the persistence service.
    pub storage_url: String,
    /// Base URL of the session provider (private API accounts only).
    pub session_url: String,
    /// Base URL of the text generation service.
    pub generation_url: String,
    pub graph_api_url: String,
    pub private_api_url: String,
    /// Port for the health endpoint.
    pub port: u16,
    /// Sync+generate poll interval, also used as the backoff after a failed fetch.
    pub sync_interval: Duration,
    /// Dispatch poll interval, also used as the backoff after a failed fetch.
    pub dispatch_interval: Duration,
    pub pacing: PacingConfig,
}

impl ServiceConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let storage_url = required("WRAPPER_SERVICE_HOST")?;
        let auth_host = required("AUTH_SERVICE_HOST")?;
        let generation_url = required("ML_SERVICE_HOST")?;

        let graph_api_url = lookup("GRAPH_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GRAPH_API_BASE_URL.to_string());
        let private_api_url = lookup("PRIVATE_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_PRIVATE_API_BASE_URL.to_string());

        let port: u16 = parse_or(&lookup, "APP_PORT", 8080)?;
        let sync_interval_secs: u64 = parse_or(&lookup, "SYNC_INTERVAL_SECS", 60)?;
        let dispatch_interval_secs: u64 = parse_or(&lookup, "DISPATCH_INTERVAL_SECS", 60)?;

        let defaults = PacingConfig::default();
        let pacing = PacingConfig::new(
            parse_or(&lookup, "DISPATCH_DELAY_MIN_SECS", defaults.min_delay_secs)?,
            parse_or(&lookup, "DISPATCH_DELAY_MAX_SECS", defaults.max_delay_secs)?,
            parse_or(&lookup, "DISPATCH_BATCH_PAUSE_SECS", defaults.batch_pause_secs)?,
        )?;

        Ok(Self {
            storage_url,
            session_url: format!("{auth_host}/api/v1/session"),
            generation_url,
            graph_api_url: graph_api_url.trim_end_matches('/').to_string(),
            private_api_url: private_api_url.trim_end_matches('/').to_string(),
            port,
            sync_interval: Duration::from_secs(sync_interval_secs),
            dispatch_interval: Duration::from_secs(dispatch_interval_secs),
            pacing,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Outbound pacing for the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    /// Lower bound of the per-draft jitter window (inclusive).
    pub min_delay_secs: u64,
    /// Upper bound of the per-draft jitter window (inclusive).
    pub max_delay_secs: u64,
    /// Fixed pause after each account's drafts.
    pub batch_pause_secs: u64,
}

impl PacingConfig {
    pub fn new(
        min_delay_secs: u64,
        max_delay_secs: u64,
        batch_pause_secs: u64,
    ) -> Result<Self, ConfigError> {
        if min_delay_secs > max_delay_secs {
            return Err(ConfigError::InvalidValue {
                key: "DISPATCH_DELAY_MIN_SECS".to_string(),
                message: format!("{min_delay_secs} is greater than max delay {max_delay_secs}"),
            });
        }
        Ok(Self {
            min_delay_secs,
            max_delay_secs,
            batch_pause_secs,
        })
    }

    /// No pauses at all.
    pub fn disabled() -> Self {
        Self {
            min_delay_secs: 0,
            max_delay_secs: 0,
            batch_pause_secs: 0,
        }
    }

    /// Draw a delay uniformly from the jitter window.
    pub fn jitter(&self) -> Duration {
        let secs = rand::thread_rng().gen_range(self.min_delay_secs..=self.max_delay_secs);
        Duration::from_secs(secs)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_secs(self.batch_pause_secs)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: 3,
            max_delay_secs: 10,
            batch_pause_secs: 60,
        }
    }
}
