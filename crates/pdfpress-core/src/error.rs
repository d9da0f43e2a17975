//! # Design
//!
//! - Provide structured, constant-message errors for the compression pipeline.
//! - Carry operation context (paths, fields, stages) in fields rather than messages.
//! - Item-level variants are folded into [`crate::item::ItemFailure`] values by the coordinator.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::command::ToolError;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors produced by the compression and conversion pipelines.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caller input was rejected before any work started.
    #[error("invalid pipeline input")]
    Validation {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Local filesystem failure.
    #[error("pipeline io failure")]
    Resource {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A mandatory external stage failed.
    #[error("external tool stage failed")]
    ExternalTool {
        /// Pipeline stage that failed.
        stage: &'static str,
        /// Underlying tool error.
        source: ToolError,
    },
    /// Every submitted item failed.
    #[error("no batch item succeeded")]
    AggregateFailure {
        /// Number of items submitted in the batch.
        submitted: usize,
    },
    /// The batch archive could not be built.
    #[error("archive construction failed")]
    Archive {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Archive path involved in the failure.
        path: PathBuf,
        /// Underlying archive error.
        source: ArchiveError,
    },
}

impl PipelineError {
    pub(crate) fn io(operation: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Resource {
            operation,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: &'static str, value: Option<String>) -> Self {
        Self::Validation {
            field,
            reason,
            value,
        }
    }

    pub(crate) const fn tool(stage: &'static str, source: ToolError) -> Self {
        Self::ExternalTool { stage, source }
    }

    /// Whether the error was caused by caller input rather than the service.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn io_helper_preserves_source_and_path() {
        let err = PipelineError::io(
            "pipeline.metadata",
            "/tmp/missing.pdf",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.to_string(), "pipeline io failure");
        assert!(err.source().is_some());
        assert!(matches!(
            err,
            PipelineError::Resource { operation: "pipeline.metadata", ref path, .. }
                if path == Path::new("/tmp/missing.pdf")
        ));
    }

    #[test]
    fn validation_is_flagged() {
        let err = PipelineError::invalid("level", "unknown_profile", Some("tiny".into()));
        assert!(err.is_validation());
        assert!(err.source().is_none());
        assert!(!PipelineError::AggregateFailure { submitted: 2 }.is_validation());
    }

    #[test]
    fn tool_helper_wraps_tool_error() {
        let err = PipelineError::tool(
            "render",
            ToolError::Missing {
                program: "gs".into(),
            },
        );
        assert_eq!(err.to_string(), "external tool stage failed");
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("external tool not found")
        );
    }
}
