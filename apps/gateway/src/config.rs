//! Gateway configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use tillpoint_core::MAX_SALE_ITEMS;

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP server port
    pub http_port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Redis connection string (optional, enables the shared stock cache)
    pub redis_url: Option<String>,

    /// JWT secret key for validating caller tokens
    pub jwt_secret: String,

    /// JWT access token lifetime in seconds
    pub jwt_access_lifetime_secs: i64,

    /// How long a batched availability answer is reused
    pub stock_cache_ttl_secs: u64,

    /// Line items accepted in one offline sale
    pub max_sale_items: usize,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = GatewayConfig {
            http_port: parse_var(&lookup, "TILLPOINT_HTTP_PORT", "8080")?,

            database_path: lookup("TILLPOINT_DATABASE_PATH")
                .unwrap_or_else(|| "./tillpoint.db".to_string()),

            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),

            jwt_secret: lookup("JWT_SECRET")
                // In production, this MUST be set via environment variable
                .unwrap_or_else(|| "tillpoint-dev-secret-change-in-production".to_string()),

            jwt_access_lifetime_secs: parse_var(&lookup, "JWT_ACCESS_LIFETIME_SECS", "3600")?,

            stock_cache_ttl_secs: parse_var(&lookup, "TILLPOINT_STOCK_CACHE_TTL_SECS", "5")?,

            max_sale_items: parse_var(
                &lookup,
                "TILLPOINT_MAX_SALE_ITEMS",
                &MAX_SALE_ITEMS.to_string(),
            )?,
        };

        if config.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if config.max_sale_items == 0 {
            return Err(ConfigError::InvalidValue("TILLPOINT_MAX_SALE_ITEMS".to_string()));
        }

        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
