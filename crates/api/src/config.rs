use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tabrun_core::retry::{RetryPolicy, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};
use tabrun_core::scripting::tabular_editor::{
    TabularEditorConfig, DEFAULT_EXECUTABLE, DEFAULT_SCRIPTS_DIR,
};

/// A configuration value could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{key} has invalid value '{value}': {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight runs to stop (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Tool location, scripts directory and per-stage timeout.
    pub executor: TabularEditorConfig,
    pub retry: RetryPolicy,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                              |
    /// |------------------------------|--------------------------------------|
    /// | `HOST`                       | `0.0.0.0`                            |
    /// | `PORT`                       | `3000`                               |
    /// | `CORS_ORIGINS`               | `http://localhost:5173`              |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                                 |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `30`                                 |
    /// | `TABULAR_EDITOR_PATH`        | `../TabularEditor/TabularEditor.exe` |
    /// | `TABULAR_EDITOR_SCRIPTS_DIR` | `../TabularEditor/Scripts`           |
    /// | `STAGE_TIMEOUT_SECS`         | unset (no limit)                     |
    /// | `RETRY_MAX_ATTEMPTS`         | `2`                                  |
    /// | `RETRY_BACKOFF_SECS`         | `30`                                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse(&lookup, "PORT", "3000")?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse(&lookup, "REQUEST_TIMEOUT_SECS", "30")?;
        let shutdown_timeout_secs: u64 = parse(&lookup, "SHUTDOWN_TIMEOUT_SECS", "30")?;

        let stage_timeout = match lookup("STAGE_TIMEOUT_SECS").filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(Duration::from_secs(parse_value("STAGE_TIMEOUT_SECS", &raw)?)),
            None => None,
        };
        let executor = TabularEditorConfig {
            executable: PathBuf::from(
                lookup("TABULAR_EDITOR_PATH").unwrap_or_else(|| DEFAULT_EXECUTABLE.into()),
            ),
            scripts_dir: PathBuf::from(
                lookup("TABULAR_EDITOR_SCRIPTS_DIR").unwrap_or_else(|| DEFAULT_SCRIPTS_DIR.into()),
            ),
            timeout: stage_timeout,
        };

        let max_attempts: u32 = parse(
            &lookup,
            "RETRY_MAX_ATTEMPTS",
            &DEFAULT_MAX_ATTEMPTS.to_string(),
        )?;
        if max_attempts == 0 {
            return Err(ConfigError {
                key: "RETRY_MAX_ATTEMPTS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        let backoff_secs: u64 = parse(
            &lookup,
            "RETRY_BACKOFF_SECS",
            &DEFAULT_BACKOFF.as_secs().to_string(),
        )?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            executor,
            retry: RetryPolicy::new(max_attempts, Duration::from_secs(backoff_secs)),
        })
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    parse_value(key, &raw)
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
