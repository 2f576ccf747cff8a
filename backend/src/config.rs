//! Service configuration loaded from the environment.
//!
//! | Variable                  | Default            |
//! |---------------------------|--------------------|
//! | `CSVFETCH_PORT`           | `3000`             |
//! | `CSVFETCH_TIMEOUT_SECS`   | `30`               |
//! | `CSVFETCH_USER_AGENT`     | `csvfetch/<version>` |
//! | `CSVFETCH_MAX_BODY_BYTES` | `16777216`         |
//!
//! A `.env` file in the working directory is loaded first when present.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ServiceConfigError;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Port for `csvfetch serve`.
    pub port: u16,
    /// Default timeout for outbound fetches.
    pub timeout: Duration,
    pub user_agent: String,
    /// Largest response body the HTTP fetcher will buffer.
    pub max_body_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: default_user_agent(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

fn default_user_agent() -> String {
    format!("csvfetch/{}", env!("CARGO_PKG_VERSION"))
}

impl ServiceConfig {
    /// Load from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ServiceConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServiceConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parse_var(&lookup, "CSVFETCH_PORT")?.unwrap_or(defaults.port);
        let timeout = parse_var::<u64, _>(&lookup, "CSVFETCH_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let max_body_bytes =
            parse_var(&lookup, "CSVFETCH_MAX_BODY_BYTES")?.unwrap_or(defaults.max_body_bytes);
        let user_agent = lookup("CSVFETCH_USER_AGENT")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.user_agent);

        if timeout.is_zero() {
            return Err(ServiceConfigError::InvalidValue {
                name: "CSVFETCH_TIMEOUT_SECS",
                value: "0".to_string(),
                message: "timeout must be positive".to_string(),
            });
        }

        Ok(Self {
            port,
            timeout,
            user_agent,
            max_body_bytes,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ServiceConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ServiceConfigError::InvalidValue {
                name,
                value: raw.clone(),
                message: e.to_string(),
            }),
    }
}
