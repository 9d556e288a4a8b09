//! Configuration loading and representation.
//!
//! Settings come from the process environment, after an optional `.env` file
//! has been merged in by [`load_dotenv`]. Parsing goes through a lookup
//! function so tests never have to mutate the real environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DEV_SECRET_KEY: &str = "changethis-dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Environment {
    Local,
    Staging,
    Production,
}

impl Environment {
    pub fn is_local(self) -> bool {
        matches!(self, Environment::Local)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Fully-resolved process settings.
#[derive(Clone)]
pub struct Settings {
    pub environment: Environment,
    pub bind_addr: SocketAddr,
    pub api_v1_str: String,
    pub secret_key: String,
    pub access_token_expire_minutes: i64,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_connect_max_tries: u32,
    pub db_connect_wait: Duration,
    pub first_superuser: String,
    pub first_superuser_password: String,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("environment", &self.environment)
            .field("bind_addr", &self.bind_addr)
            .field("api_v1_str", &self.api_v1_str)
            .field("access_token_expire_minutes", &self.access_token_expire_minutes)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("db_connect_max_tries", &self.db_connect_max_tries)
            .field("db_connect_wait", &self.db_connect_wait)
            .field("first_superuser", &self.first_superuser)
            .finish_non_exhaustive()
    }
}

/// Merge `.env` into the process environment if one exists. Missing file is fine.
///
/// Runs before tracing is set up, so `.env` can carry `RUST_LOG`; the caller
/// logs the returned path once a subscriber is installed.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = parse_or("ENVIRONMENT", get("ENVIRONMENT"), Environment::Local)?;

        let secret_key = match get("SECRET_KEY") {
            Some(key) => key,
            None if environment.is_local() => {
                tracing::warn!("SECRET_KEY not set; using insecure dev default");
                DEV_SECRET_KEY.to_string()
            }
            None => return Err(ConfigError::Missing("SECRET_KEY")),
        };

        let database_url = get("DATABASE_URL");
        if database_url.is_none() && !environment.is_local() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let access_token_expire_minutes: i64 = parse_or(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            get("ACCESS_TOKEN_EXPIRE_MINUTES"),
            60 * 24 * 8,
        )?;
        if access_token_expire_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "ACCESS_TOKEN_EXPIRE_MINUTES",
                reason: "must be positive".into(),
            });
        }

        let mut api_v1_str = get("API_V1_STR").unwrap_or_else(|| "/api/v1".to_string());
        if !api_v1_str.starts_with('/') {
            api_v1_str.insert(0, '/');
        }
        let api_v1_str = api_v1_str.trim_end_matches('/').to_string();

        Ok(Self {
            environment,
            bind_addr: parse_or(
                "BIND_ADDR",
                get("BIND_ADDR"),
                SocketAddr::from(([0, 0, 0, 0], 8080)),
            )?,
            api_v1_str,
            secret_key,
            access_token_expire_minutes,
            database_url,
            db_connect_max_tries: parse_or("DB_CONNECT_MAX_TRIES", get("DB_CONNECT_MAX_TRIES"), 300)?,
            db_connect_wait: Duration::from_secs(parse_or(
                "DB_CONNECT_WAIT_SECONDS",
                get("DB_CONNECT_WAIT_SECONDS"),
                1,
            )?),
            first_superuser: get("FIRST_SUPERUSER").ok_or(ConfigError::Missing("FIRST_SUPERUSER"))?,
            first_superuser_password: get("FIRST_SUPERUSER_PASSWORD")
                .ok_or(ConfigError::Missing("FIRST_SUPERUSER_PASSWORD"))?,
        })
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_expire_minutes)
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}
