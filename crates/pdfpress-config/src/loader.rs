//! Environment parsing and validation for [`ServiceConfig`].
//!
//! # Design
//! - Absent variables fall back to defaults; present but malformed variables are errors.
//! - Parsing goes through a lookup closure so tests never touch the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{LoggingSettings, ServiceConfig, ToolPaths};

const ENV_PORT: &str = "PORT";
const ENV_BIND_ADDR: &str = "BIND_ADDR";
const ENV_MAX_UPLOAD: &str = "MAX_FILE_UPLOAD_SIZE";
const ENV_CLEANUP_INTERVAL: &str = "CLEANUP_CRON_INTERVAL";
const ENV_RETENTION: &str = "CLEANUP_RETENTION_MINUTES";
const ENV_UPLOAD_DIR: &str = "UPLOAD_DIR";
const ENV_MAX_JOBS: &str = "MAX_CONCURRENT_JOBS";
const ENV_REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT_SECS";
const ENV_GS: &str = "GS_BINARY";
const ENV_QPDF: &str = "QPDF_BINARY";
const ENV_PYTHON: &str = "PYTHON_BINARY";
const ENV_WORD_SCRIPT: &str = "WORD_SCRIPT_PATH";
const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

impl ServiceConfig {
    /// Load configuration from the process environment, reading an optional
    /// `.env` file from the working directory first.
    ///
    /// # Errors
    ///
    /// Returns an error when a `.env` file exists but cannot be parsed, or
    /// when any variable is malformed or out of range.
    pub fn from_env() -> ConfigResult<Self> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(err) if err.not_found() => {}
            Err(source) => return Err(ConfigError::EnvFile { source }),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error when any variable is malformed or out of range.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let cleanup_interval =
            parse::<u64, _>(&get, ENV_CLEANUP_INTERVAL)?.map_or(defaults::CLEANUP_INTERVAL, minutes);
        let retention = parse::<u64, _>(&get, ENV_RETENTION)?.map_or(cleanup_interval, minutes);

        let config = Self {
            bind_addr: parse(&get, ENV_BIND_ADDR)?.unwrap_or(defaults::BIND_ADDR),
            http_port: parse(&get, ENV_PORT)?.unwrap_or(defaults::HTTP_PORT),
            max_upload_size_mb: parse(&get, ENV_MAX_UPLOAD)?
                .unwrap_or(defaults::MAX_UPLOAD_SIZE_MB),
            cleanup_interval,
            retention,
            upload_dir: get(ENV_UPLOAD_DIR)
                .map_or_else(|| PathBuf::from(defaults::UPLOAD_DIR), PathBuf::from),
            max_concurrent_jobs: parse(&get, ENV_MAX_JOBS)?
                .unwrap_or_else(defaults::max_concurrent_jobs),
            request_timeout: parse::<u64, _>(&get, ENV_REQUEST_TIMEOUT)?
                .map_or(defaults::REQUEST_TIMEOUT, Duration::from_secs),
            tools: ToolPaths {
                ghostscript: get(ENV_GS).unwrap_or_else(|| defaults::GHOSTSCRIPT_BINARY.into()),
                qpdf: get(ENV_QPDF).unwrap_or_else(|| defaults::QPDF_BINARY.into()),
                python: get(ENV_PYTHON).unwrap_or_else(|| defaults::PYTHON_BINARY.into()),
                word_script: get(ENV_WORD_SCRIPT).map(PathBuf::from),
            },
            logging: LoggingSettings {
                level: get(ENV_LOG_LEVEL).unwrap_or_else(|| defaults::LOG_LEVEL.into()),
                format: get(ENV_LOG_FORMAT),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot drive the service.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.http_port == 0 {
            return Err(ConfigError::invalid(ENV_PORT, "zero", "0"));
        }
        if self.max_upload_size_mb == 0 {
            return Err(ConfigError::invalid(ENV_MAX_UPLOAD, "zero", "0"));
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::invalid(ENV_CLEANUP_INTERVAL, "zero", "0"));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::invalid(ENV_MAX_JOBS, "zero", "0"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid(ENV_REQUEST_TIMEOUT, "zero", "0"));
        }
        if self.upload_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidField {
                field: ENV_UPLOAD_DIR,
                reason: "empty",
                value: None,
            });
        }
        Ok(())
    }
}

fn parse<T, G>(get: &G, key: &'static str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::invalid(key, "unparseable", &raw)),
        None => Ok(None),
    }
}

const fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(60))
}
