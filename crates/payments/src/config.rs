//! Payment service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `PAYMENTS_HOST` - Bind address (default: 127.0.0.1)
//! - `PAYMENTS_PORT` - Listen port (default: 8081)
//! - `PAYMENTS_RANDOM_BALANCE_MAX` - Upper bound (exclusive) of generated
//!   opening balances (default: 3000)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use intershop_core::Price;
use rust_decimal::Decimal;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Payment service configuration.
#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Generated opening balances fall in `[0, random_balance_max)`
    pub random_balance_max: Price,
    pub sentry_dsn: Option<String>,
}

impl PaymentsConfig {
    /// Load configuration from environment variables (and `.env` if present).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max: Decimal = parse_or(get("PAYMENTS_RANDOM_BALANCE_MAX"), "PAYMENTS_RANDOM_BALANCE_MAX", "3000")?;
        if max.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "PAYMENTS_RANDOM_BALANCE_MAX".to_string(),
                "must not be negative".to_string(),
            ));
        }

        Ok(Self {
            host: parse_or(get("PAYMENTS_HOST"), "PAYMENTS_HOST", "127.0.0.1")?,
            port: parse_or(get("PAYMENTS_PORT"), "PAYMENTS_PORT", "8081")?,
            random_balance_max: Price::new(max),
            sentry_dsn: get("SENTRY_DSN"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .as_deref()
        .unwrap_or(default)
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
