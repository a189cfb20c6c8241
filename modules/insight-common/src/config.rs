use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Relay configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Base URL of the analysis service; `/search` is appended per request.
    pub server_url: String,

    // Web server
    pub host: String,
    pub port: u16,

    /// Upper bound for the upstream to answer with response headers.
    pub request_timeout: Duration,
    /// Upper bound between two upstream body chunks.
    pub idle_timeout: Duration,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        tracing::info!(
            upstream = %config.search_url(),
            request_timeout_secs = config.request_timeout.as_secs(),
            idle_timeout_secs = config.idle_timeout.as_secs(),
            "Relay config loaded"
        );
        Ok(config)
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let server_url = get("SERVER_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("SERVER_URL environment variable is required"))?;

        let port = get("RELAY_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .context("RELAY_PORT must be a number")?;

        Ok(Self {
            server_url: server_url.trim().trim_end_matches('/').to_string(),
            host: get("RELAY_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            request_timeout: secs(&get, "RELAY_REQUEST_TIMEOUT_SECS", 30)?,
            idle_timeout: secs(&get, "RELAY_IDLE_TIMEOUT_SECS", 300)?,
        })
    }

    pub fn search_url(&self) -> String {
        format!("{}/search", self.server_url)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn secs(get: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    let value = match get(key) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number of seconds"))?,
        None => default,
    };
    if value == 0 {
        return Err(anyhow!("{key} must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}
