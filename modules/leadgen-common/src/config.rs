use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::LeadGenError;

pub const DEFAULT_DEDUP_TTL_DAYS: u64 = 30;
pub const MAX_DEDUP_TTL_DAYS: u64 = 3650;
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_GEOCODER_USER_AGENT: &str = "leadgen/0.1";
pub const DEFAULT_GEOCODE_TIMEOUT_SECS: u64 = 10;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Durable store
    pub database_url: String,

    // Seen-entity cache
    pub dedup_ttl_days: u64,

    // Geocoding
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    pub geocode_timeout_secs: u64,

    // Mapping links
    pub google_maps_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            dedup_ttl_days: checked_ttl_days(parsed_env(
                "DEDUPLICATION_TTL_DAYS",
                DEFAULT_DEDUP_TTL_DAYS,
            )?)?,
            geocoder_url: env::var("GEOCODER_URL")
                .unwrap_or_else(|_| DEFAULT_GEOCODER_URL.to_string()),
            geocoder_user_agent: env::var("GEOCODER_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_GEOCODER_USER_AGENT.to_string()),
            geocode_timeout_secs: parsed_env("GEOCODE_TIMEOUT_SECS", DEFAULT_GEOCODE_TIMEOUT_SECS)?,
            google_maps_api_key: env::var("GOOGLE_MAPS_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
        };

        Ok(config)
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_days.saturating_mul(24 * 60 * 60))
    }

    pub fn geocode_timeout(&self) -> Duration {
        Duration::from_secs(self.geocode_timeout_secs)
    }

    /// Log config with secrets redacted.
    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let n = val.len().min(5);
            format!("{}...({} chars)", &val[..n], val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", preview(&self.database_url));
        tracing::info!("  DEDUPLICATION_TTL_DAYS: {}", self.dedup_ttl_days);
        tracing::info!("  GEOCODER_URL: {}", self.geocoder_url);
        tracing::info!("  GEOCODE_TIMEOUT_SECS: {}", self.geocode_timeout_secs);
        tracing::info!("  GOOGLE_MAPS_API_KEY: {}", preview_opt(&self.google_maps_api_key));
    }
}

/// Seen-markers must expire; zero or absurdly long lifetimes are rejected.
fn checked_ttl_days(days: u64) -> Result<u64, LeadGenError> {
    if days == 0 || days > MAX_DEDUP_TTL_DAYS {
        return Err(LeadGenError::Config(format!(
            "DEDUPLICATION_TTL_DAYS must be between 1 and {MAX_DEDUP_TTL_DAYS}, got {days}"
        )));
    }
    Ok(days)
}

fn parsed_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
