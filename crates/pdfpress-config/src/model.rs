//! Typed configuration models shared by the service and the CLI.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::defaults;

/// Runtime configuration for the pdfpress service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceConfig {
    /// Interface the HTTP listener binds to.
    pub bind_addr: IpAddr,
    /// TCP port for the HTTP listener.
    pub http_port: u16,
    /// Maximum accepted request body, in mebibytes.
    pub max_upload_size_mb: u64,
    /// Period between retention sweeps of the working directory.
    pub cleanup_interval: Duration,
    /// Minimum age before a working-directory entry may be swept.
    pub retention: Duration,
    /// Working directory holding uploads, outputs, and archives.
    pub upload_dir: PathBuf,
    /// Number of pipeline runs allowed to execute at once.
    pub max_concurrent_jobs: usize,
    /// Whole-request timeout applied by the HTTP surface.
    pub request_timeout: Duration,
    /// External tool locations.
    pub tools: ToolPaths,
    /// Logging preferences.
    pub logging: LoggingSettings,
}

/// Locations of the external programs the pipelines shell out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolPaths {
    /// Ghostscript executable.
    pub ghostscript: String,
    /// qpdf executable.
    pub qpdf: String,
    /// Python interpreter used for Word conversion.
    pub python: String,
    /// Explicit Word conversion script; searched for when unset.
    pub word_script: Option<PathBuf>,
}

/// Logging preferences resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingSettings {
    /// Level directive handed to the subscriber filter.
    pub level: String,
    /// Requested output format (`json` or `pretty`); inferred when unset.
    pub format: Option<String>,
}

impl ServiceConfig {
    /// Socket address assembled from the bind address and port.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.http_port)
    }

    /// Maximum request body in bytes, saturating on overflow.
    #[must_use]
    pub fn max_upload_bytes(&self) -> usize {
        let bytes = self.max_upload_size_mb.saturating_mul(1024 * 1024);
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: defaults::BIND_ADDR,
            http_port: defaults::HTTP_PORT,
            max_upload_size_mb: defaults::MAX_UPLOAD_SIZE_MB,
            cleanup_interval: defaults::CLEANUP_INTERVAL,
            retention: defaults::CLEANUP_INTERVAL,
            upload_dir: PathBuf::from(defaults::UPLOAD_DIR),
            max_concurrent_jobs: defaults::max_concurrent_jobs(),
            request_timeout: defaults::REQUEST_TIMEOUT,
            tools: ToolPaths::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ghostscript: defaults::GHOSTSCRIPT_BINARY.to_string(),
            qpdf: defaults::QPDF_BINARY.to_string(),
            python: defaults::PYTHON_BINARY.to_string(),
            word_script: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}
