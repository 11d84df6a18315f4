//! Shop API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Shop API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopConfig {
    /// HTTP server port
    pub http_port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// Shared secret the login service signs session tokens with
    pub jwt_secret: String,

    /// Re-runs of a write transaction that lost a race
    pub tx_max_retries: u32,

    /// Pickup code draws before an order placement gives up
    pub pickup_code_attempts: u32,
}

impl ShopConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ShopConfig {
            http_port: parse_var("SHOP_HTTP_PORT", "8080")?,

            database_path: env::var("SHOP_DATABASE_PATH").unwrap_or_else(|_| "./shop.db".to_string()),

            db_max_connections: parse_var("SHOP_DB_MAX_CONNECTIONS", "5")?,

            jwt_secret: required_secret("SHOP_JWT_SECRET", env::var("SHOP_JWT_SECRET").ok())?,

            tx_max_retries: parse_var("SHOP_TX_MAX_RETRIES", "5")?,

            pickup_code_attempts: parse_var("SHOP_PICKUP_CODE_ATTEMPTS", "20")?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("SHOP_DB_MAX_CONNECTIONS".to_string()));
        }
        Ok(config)
    }
}

/// Secrets have no default: an absent or blank value refuses to start.
fn required_secret(name: &str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(secret) if !secret.trim().is_empty() => Ok(secret),
        _ => Err(ConfigError::MissingRequired(name.to_string())),
    }
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_default_and_invalid() {
        let port: u16 = parse_var("SHOP_TEST_UNSET_PORT", "8080").unwrap();
        assert_eq!(port, 8080);

        let bad: Result<u16, _> = parse_var("SHOP_TEST_UNSET_PORT", "not-a-port");
        assert!(matches!(bad, Err(ConfigError::InvalidValue(name)) if name == "SHOP_TEST_UNSET_PORT"));
    }

    #[test]
    fn test_jwt_secret_has_no_fallback() {
        assert!(matches!(
            required_secret("SHOP_JWT_SECRET", None),
            Err(ConfigError::MissingRequired(name)) if name == "SHOP_JWT_SECRET"
        ));
        assert!(matches!(
            required_secret("SHOP_JWT_SECRET", Some("  ".to_string())),
            Err(ConfigError::MissingRequired(_))
        ));
        assert_eq!(
            required_secret("SHOP_JWT_SECRET", Some("s3cret".to_string())).unwrap(),
            "s3cret"
        );
    }
}
