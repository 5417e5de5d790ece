use std::net::{AddrParseError, SocketAddr};
use std::num::ParseIntError;
use std::time::Duration;

use interfaces_github_repos::index::{GitHubClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use thiserror::Error;
use utils_trace::{LogFormat, TracingInitError};

pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const GITHUB_API_BASE_URL: &str = "GITHUB_API_BASE_URL";
pub const GITHUB_HTTP_TIMEOUT_SECS: &str = "GITHUB_HTTP_TIMEOUT_SECS";
pub const BIND_ADDR: &str = "BIND_ADDR";
pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const LOG_FORMAT: &str = "LOG_FORMAT";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct Config {
    pub github: GitHubClientConfig,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("LoadDotenv: {source}")]
    LoadDotenv {
        source: dotenvy::Error,
    },

    #[error("MissingVar: {name} must be set")]
    MissingVar {
        name: &'static str,
    },

    #[error("InvalidTimeout: {value}: {source}")]
    InvalidTimeout {
        value: String,
        source: ParseIntError,
    },

    #[error("ZeroTimeout: {name} must be greater than zero")]
    ZeroTimeout {
        name: &'static str,
    },

    #[error("InvalidBindAddr: {value}: {source}")]
    InvalidBindAddr {
        value: String,
        source: AddrParseError,
    },

    #[error("InvalidLogFormat: {source}")]
    InvalidLogFormat {
        source: TracingInitError,
    },
}

impl Config {
    /// Reads `.env` when present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(ConfigError::LoadDotenv { source }),
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // blank values count as unset
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let token = var(GITHUB_TOKEN).ok_or(ConfigError::MissingVar { name: GITHUB_TOKEN })?;

        let base_url = var(GITHUB_API_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

        let timeout = match var(GITHUB_HTTP_TIMEOUT_SECS) {
            Some(value) => {
                let secs: u64 = value
                    .trim()
                    .parse()
                    .map_err(|source| ConfigError::InvalidTimeout { value: value.clone(), source })?;
                if secs == 0 {
                    return Err(ConfigError::ZeroTimeout {
                        name: GITHUB_HTTP_TIMEOUT_SECS,
                    });
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };

        let bind_value = var(BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned());
        let bind_addr: SocketAddr = bind_value
            .trim()
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr { value: bind_value.clone(), source })?;

        let log_level = var(LOG_LEVEL).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned());

        let log_format: LogFormat = match var(LOG_FORMAT) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidLogFormat { source })?,
            None => LogFormat::default(),
        };

        Ok(Config {
            github: GitHubClientConfig {
                base_url,
                token,
                timeout,
            },
            bind_addr,
            log_level,
            log_format,
        })
    }
}
