//! Configuration loader for the `gps-tracker-backend` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Route handlers only ever see the resulting
//! [`Config`] snapshot through the shared router state.
//!
use std::env;

use anyhow::{anyhow, Result};
use chrono::FixedOffset;

/// Parse an optional numeric environment variable with a default value.
macro_rules! parse_env_num {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// TCP port the HTTP server listens on.
    pub http_port: u16,

    /// Device tokens accepted as `Authorization: Bearer <token>`.
    pub device_ids: Vec<String>,

    /// Offset of the local calendar used for day/week/month/year buckets.
    pub local_offset: FixedOffset,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `HTTP_PORT` – listen port (default: 8080)
/// - `IOT_DEVICE_IDS` – comma-separated device token allow-list (default: empty)
/// - `LOCAL_UTC_OFFSET_MINUTES` – calendar offset from UTC (default: 0)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env_num!("DB_POOL_MAX", u32, 5);
    let http_port = parse_env_num!("HTTP_PORT", u16, 8080);
    let offset_minutes = parse_env_num!("LOCAL_UTC_OFFSET_MINUTES", i32, 0);
    let device_ids = parse_device_ids(&env::var("IOT_DEVICE_IDS").unwrap_or_default());

    let local_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
        anyhow!(
            "Invalid LOCAL_UTC_OFFSET_MINUTES: {} is out of range",
            offset_minutes
        )
    })?;

    Ok(Config {
        db_url,
        db_pool_max,
        http_port,
        device_ids,
        local_offset,
    })
}

/// Split a comma-separated token list, dropping blanks and surrounding whitespace.
pub fn parse_device_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Whether `token` is one of the configured device identifiers.
    pub fn is_known_device(&self, token: &str) -> bool {
        self.device_ids.iter().any(|id| id == token)
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the database password and only reports how many device tokens
    /// are configured, since the tokens are the device credentials.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL             : {}", mask_db_url(&self.db_url));
        tracing::info!("  DB_POOL_MAX              : {}", self.db_pool_max);
        tracing::info!("  HTTP_PORT                : {}", self.http_port);
        tracing::info!("  IOT_DEVICE_IDS           : {} configured", self.device_ids.len());
        tracing::info!("  LOCAL_UTC_OFFSET_MINUTES : {}", self.local_offset.local_minus_utc() / 60);

        if self.device_ids.is_empty() {
            tracing::warn!("No IOT_DEVICE_IDS configured, device writes will be rejected");
        }
    }
}

/// Replace the password component of a connection string with `****`.
pub fn mask_db_url(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            // `postgres://host@...` has its only colon in the scheme
            if !db_url[colon_pos..].starts_with("://") {
                return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
            }
        }
    }
    db_url.to_string()
}
