use std::time::Duration;

use anyhow::{Context, Result};

use crate::engine::{RetreatPolicy, SessionSettings};

/// Application configuration loaded from environment variables.
/// Fails at startup if a value is present but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Base URL of the remote progress API. `None` runs on the in-memory store.
    pub progress_api_url: Option<String>,
    pub progress_api_token: Option<String>,
    pub http_timeout: Duration,
    pub save_debounce: Duration,
    pub resync_interval: Duration,
    pub retreat_scoring: RetreatPolicy,
    /// Open sessions untouched for this long are saved and dropped.
    pub session_idle: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            progress_api_url: optional_env("PROGRESS_API_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            progress_api_token: optional_env("PROGRESS_API_TOKEN"),
            http_timeout: Duration::from_secs(
                parse_env("HTTP_TIMEOUT_SECS", 10u64)
                    .context("HTTP_TIMEOUT_SECS must be a number of seconds")?,
            ),
            save_debounce: Duration::from_millis(
                parse_env("SAVE_DEBOUNCE_MS", 100u64)
                    .context("SAVE_DEBOUNCE_MS must be a number of milliseconds")?,
            ),
            resync_interval: Duration::from_secs(
                parse_env("RESYNC_INTERVAL_SECS", 300u64)
                    .context("RESYNC_INTERVAL_SECS must be a number of seconds")?,
            ),
            session_idle: Duration::from_secs(
                parse_env("SESSION_IDLE_SECS", 1800u64)
                    .context("SESSION_IDLE_SECS must be a number of seconds")?,
            ),
            retreat_scoring: optional_env("RETREAT_SCORING")
                .map(|v| v.parse::<RetreatPolicy>())
                .transpose()
                .map_err(anyhow::Error::msg)
                .context("RETREAT_SCORING must be 'exact' or 'fixed_unit'")?
                .unwrap_or_default(),
        })
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            debounce: self.save_debounce,
            resync_interval: self.resync_interval,
            retreat_policy: self.retreat_scoring,
            idle_timeout: self.session_idle,
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}
