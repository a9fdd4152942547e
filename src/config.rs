//! Configuration management for the board service.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `DATABASE_PATH` - Optional. SQLite file. Defaults to `./taskboard.db`;
//!   `:memory:` selects the non-persistent store.
//! - `PAGE_SIZE` - Optional. Tasks per column per page. Defaults to `10`.
//! - `JWT_SECRET` - Required unless `DEV_MODE` is on. Verifies bearer tokens.
//! - `DEV_MODE` - Optional. When true, requests without a token act as
//!   `DEV_USER_ID`. Defaults to `false`.
//! - `DEV_USER_ID` - Optional. Defaults to `dev-user`.
//!
//! Client-side settings (`TASKBOARD_URL`, `TASKBOARD_TOKEN`,
//! `TASKBOARD_FLUSH_DELAY_MS`, `TASKBOARD_REQUEST_TIMEOUT_MS`) are read by
//! [`ClientConfig::from_env`].

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::util::env_var_bool;

/// Quiet period before queued reorders are written.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_secs(5);

/// Upper bound on any single client request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Authentication settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret for HS256 bearer tokens
    pub jwt_secret: Option<String>,

    /// Owner assumed for unauthenticated requests in dev mode
    pub dev_user_id: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// SQLite database file (or `:memory:`)
    pub database_path: PathBuf,

    /// Tasks per column per page
    pub page_size: usize,

    /// Dev mode relaxes auth
    pub dev_mode: bool,

    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `JWT_SECRET` is not set outside
    /// dev mode, and `ConfigError::InvalidValue` for unparsable numbers.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dev_mode = env_var_bool("DEV_MODE", false);

        let jwt_secret = std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());
        if jwt_secret.is_none() && !dev_mode {
            return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
        }

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./taskboard.db"));

        let page_size: usize = std::env::var("PAGE_SIZE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PAGE_SIZE".to_string(), format!("{}", e)))?;
        if page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let dev_user_id =
            std::env::var("DEV_USER_ID").unwrap_or_else(|_| "dev-user".to_string());

        Ok(Self {
            host,
            port,
            database_path,
            page_size,
            dev_mode,
            auth: AuthConfig {
                jwt_secret,
                dev_user_id,
            },
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(database_path: PathBuf, jwt_secret: Option<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            database_path,
            page_size: 10,
            dev_mode: false,
            auth: AuthConfig {
                jwt_secret,
                dev_user_id: "dev-user".to_string(),
            },
        }
    }
}

/// Settings for the client-side board core.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL, e.g. `http://127.0.0.1:3000/`
    pub base_url: String,

    /// Bearer token sent with every request
    pub token: Option<String>,

    /// Quiet period before queued reorders are flushed
    pub flush_delay: Duration,

    /// Per-request timeout; a hung batch write fails instead of blocking
    /// later flushes
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("TASKBOARD_URL")
            .map_err(|_| ConfigError::MissingEnvVar("TASKBOARD_URL".to_string()))?;
        let token = std::env::var("TASKBOARD_TOKEN").ok().filter(|s| !s.is_empty());
        let flush_delay = env_millis("TASKBOARD_FLUSH_DELAY_MS", DEFAULT_FLUSH_DELAY)?;
        let request_timeout =
            env_millis("TASKBOARD_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT)?;
        if request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "TASKBOARD_REQUEST_TIMEOUT_MS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            base_url,
            token,
            flush_delay,
            request_timeout,
        })
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            flush_delay: DEFAULT_FLUSH_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

fn env_millis(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
