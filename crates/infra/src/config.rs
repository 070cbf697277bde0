//! Process configuration from environment variables.
//!
//! A `.env` file is loaded first when present (`dotenvy`); real environment
//! variables win over it.

use std::net::SocketAddr;

use secrecy::SecretString;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_CAS_MAX_ATTEMPTS: u32 = 8;
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_STORE_NAME: &str = "orderkit";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not valid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} must be set when SMTP_HOST is set")]
    Missing(&'static str),
}

/// Outbound mail settings.
#[derive(Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

#[derive(Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: SecretString,
    /// True when `JWT_SECRET` was not provided.
    pub jwt_secret_is_default: bool,
    pub database_url: Option<SecretString>,
    pub cas_max_attempts: u32,
    pub smtp: Option<SmtpConfig>,
    pub store_name: String,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup` (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = var("ORDERKIT_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: "ORDERKIT_BIND_ADDR",
                reason: e.to_string(),
            })?;

        let (jwt_secret, jwt_secret_is_default) = match var("JWT_SECRET") {
            Some(secret) => (secret, false),
            None => (DEFAULT_JWT_SECRET.to_string(), true),
        };

        let cas_max_attempts = match var("ORDERKIT_CAS_MAX_ATTEMPTS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        var: "ORDERKIT_CAS_MAX_ATTEMPTS",
                        reason: "must be at least 1".to_string(),
                    });
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: "ORDERKIT_CAS_MAX_ATTEMPTS",
                        reason: e.to_string(),
                    });
                }
            },
            None => DEFAULT_CAS_MAX_ATTEMPTS,
        };

        let smtp = match var("SMTP_HOST") {
            Some(host) => {
                let port = match var("SMTP_PORT") {
                    Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                        var: "SMTP_PORT",
                        reason: e.to_string(),
                    })?,
                    None => DEFAULT_SMTP_PORT,
                };
                Some(SmtpConfig {
                    host,
                    port,
                    username: var("SMTP_USERNAME").ok_or(ConfigError::Missing("SMTP_USERNAME"))?,
                    password: SecretString::from(
                        var("SMTP_PASSWORD").ok_or(ConfigError::Missing("SMTP_PASSWORD"))?,
                    ),
                    from_address: var("MAIL_FROM").ok_or(ConfigError::Missing("MAIL_FROM"))?,
                })
            }
            None => None,
        };

        Ok(Self {
            bind_addr,
            jwt_secret: SecretString::from(jwt_secret),
            jwt_secret_is_default,
            database_url: var("DATABASE_URL").map(SecretString::from),
            cas_max_attempts,
            smtp,
            store_name: var("ORDERKIT_STORE_NAME").unwrap_or_else(|| DEFAULT_STORE_NAME.to_string()),
        })
    }
}
