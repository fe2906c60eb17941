use std::{env, fmt::Display, str::FromStr};

use log::info;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TlsFiles {
    pub certificate: String,
    pub private_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub production: bool,
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection before giving up.
    pub connect_timeout: u64,
    pub jwt_secret: Option<Vec<u8>>,
    pub tls: Option<TlsFiles>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// `APP_ENV=production` picks `DATABASE_PROD_URL`, anything else picks
    /// `DATABASE_LOCAL_URL`; `DATABASE_URL` is the fallback for both.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let production = var("APP_ENV").is_some_and(|value| value == "production");
        let url_key = if production {
            "DATABASE_PROD_URL"
        } else {
            "DATABASE_LOCAL_URL"
        };
        let database_url = var(url_key).or_else(|| var("DATABASE_URL"));

        let tls = match (var("TLS_CERT"), var("TLS_KEY")) {
            (Some(certificate), Some(private_key)) => Some(TlsFiles {
                certificate,
                private_key,
            }),
            _ => None,
        };

        Ok(Self {
            host: var("IP").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: try_load(&var, "PORT", 8081)?,
            production,
            database_url,
            max_connections: try_load(&var, "DB_MAX_CONNECTIONS", 10)?,
            connect_timeout: try_load(&var, "DB_CONNECT_TIMEOUT", 30)?,
            jwt_secret: var("JWT_SECRET").map(String::into_bytes),
            tls,
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url.as_deref().ok_or(if self.production {
            ConfigError::Missing("DATABASE_PROD_URL")
        } else {
            ConfigError::Missing("DATABASE_LOCAL_URL")
        })
    }

    pub fn require_jwt_secret(&self) -> Result<&[u8], ConfigError> {
        self.jwt_secret
            .as_deref()
            .ok_or(ConfigError::Missing("JWT_SECRET"))
    }
}

fn try_load<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: value.clone(),
            reason: e.to_string(),
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
