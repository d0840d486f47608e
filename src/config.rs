use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DATABASE_PATH_VAR: &str = "RAMS_WORKLOAD_DB";
pub const HTTP_ADDR_VAR: &str = "RAMS_WORKLOAD_HTTP_ADDR";
pub const LOG_FILTER_VAR: &str = "RUST_LOG";

pub const DEFAULT_DATABASE_PATH: &str = "rams_workload.db";
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: '{value}'")]
    InvalidAddress { var: &'static str, value: String },
    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub http_addr: SocketAddr,
    pub log_filter: String,
}

impl AppConfig {
    /// Read the process environment, loading a `.env` file first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset variables fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |var: &'static str, default: &str| -> Result<String, ConfigError> {
            match lookup(var) {
                Some(value) if value.trim().is_empty() => Err(ConfigError::Empty { var }),
                Some(value) => Ok(value.trim().to_string()),
                None => Ok(default.to_string()),
            }
        };

        let database_path = PathBuf::from(read(DATABASE_PATH_VAR, DEFAULT_DATABASE_PATH)?);
        let raw_addr = read(HTTP_ADDR_VAR, DEFAULT_HTTP_ADDR)?;
        let http_addr = raw_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidAddress {
                var: HTTP_ADDR_VAR,
                value: raw_addr.clone(),
            })?;
        let log_filter = read(LOG_FILTER_VAR, DEFAULT_LOG_FILTER)?;

        Ok(Self {
            database_path,
            http_addr,
            log_filter,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            http_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}
