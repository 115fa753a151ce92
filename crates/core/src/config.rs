use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_usize(key: &str, default: usize) -> usize {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Runtime configuration, sourced from environment variables
/// (call [`load_dotenv`] first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the station backend.
    pub base_url: String,
    /// Station name used to scope queries (opaque to this system).
    pub station: String,
    /// CSRF token forwarded on every request when present (opaque).
    pub csrf_token: Option<String>,
    /// Worker count for general fetch batches.
    pub fetch_concurrency: usize,
    /// Page size for audit parcel pagination.
    pub page_size: usize,
    /// Validation status accepted as a confirmed missort.
    ///
    /// Observed value is 7; whether other statuses also mean "confirmed"
    /// is unknown, so the value is configurable rather than hardwired.
    pub missort_confirmed_status: i64,
}

impl Config {
    /// Build config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: env_or("LASTMILE_BASE_URL", "https://spx.shopee.com.br"),
            station: env_or("LASTMILE_STATION", ""),
            csrf_token: env_opt("LASTMILE_CSRF_TOKEN"),
            fetch_concurrency: env_usize("LASTMILE_CONCURRENCY", 6),
            page_size: env_usize("LASTMILE_PAGE_SIZE", 200),
            missort_confirmed_status: env_i64("LASTMILE_MISSORT_STATUS", 7),
        }
    }

    /// Log a redacted summary at startup.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  base_url:    {}", self.base_url);
        tracing::info!("  station:     {}", if self.station.is_empty() { "(none)" } else { &self.station });
        tracing::info!("  csrf_token:  {}", if self.csrf_token.is_some() { "set" } else { "(none)" });
        tracing::info!("  concurrency: {}", self.fetch_concurrency);
        tracing::info!("  page_size:   {}", self.page_size);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://spx.shopee.com.br".to_string(),
            station: String::new(),
            csrf_token: None,
            fetch_concurrency: 6,
            page_size: 200,
            missort_confirmed_status: 7,
        }
    }
}
