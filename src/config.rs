use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "HKare";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variables read at startup.
pub const ENV_BIND_ADDR: &str = "HKARE_BIND_ADDR";
pub const ENV_DB_PATH: &str = "HKARE_DB_PATH";
pub const ENV_LOG: &str = "HKARE_LOG";
pub const ENV_PASSWORD_ITERATIONS: &str = "HKARE_PASSWORD_ITERATIONS";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 100_000;

/// Filter used when neither `RUST_LOG` nor `HKARE_LOG` is set.
pub fn default_log_filter() -> &'static str {
    "hkare=info,hkare_lib=info,tower_http=info"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Cannot determine home directory; set {ENV_DB_PATH}")]
    NoHomeDir,
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub log_filter: String,
    pub password_iterations: u32,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                var: ENV_BIND_ADDR,
                value: bind_raw.clone(),
                reason: e.to_string(),
            })?;

        let db_path = match lookup(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        };

        let log_filter = lookup(ENV_LOG)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default_log_filter().to_string());

        let password_iterations = match lookup(ENV_PASSWORD_ITERATIONS) {
            Some(raw) => {
                let parsed = raw.trim().parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                    var: ENV_PASSWORD_ITERATIONS,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
                if parsed == 0 {
                    return Err(ConfigError::InvalidValue {
                        var: ENV_PASSWORD_ITERATIONS,
                        value: raw,
                        reason: "must be at least 1".into(),
                    });
                }
                parsed
            }
            None => DEFAULT_PASSWORD_ITERATIONS,
        };

        Ok(Self {
            bind_addr,
            db_path,
            log_filter,
            password_iterations,
        })
    }
}

/// Get the application data directory
/// ~/HKare/ on all platforms
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(APP_NAME))
}

/// Default database location inside the application data directory.
pub fn default_db_path() -> Result<PathBuf, ConfigError> {
    Ok(app_data_dir()?.join("hkare.db"))
}
