//! Per-item records produced by the batch coordinator.

use std::error::Error as _;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Where a submitted item's bytes come from.
#[derive(Debug, Clone)]
pub enum ItemSource {
    /// Bytes already held in memory (HTTP uploads).
    Bytes(Vec<u8>),
    /// A file on the local filesystem (CLI arguments).
    Path(PathBuf),
}

/// One named input of a batch submission.
#[derive(Debug, Clone)]
pub struct SubmittedItem {
    /// Caller-supplied filename, reported back unchanged.
    pub name: String,
    /// Content of the item.
    pub source: ItemSource,
}

impl SubmittedItem {
    /// Item backed by in-memory bytes.
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            source: ItemSource::Bytes(bytes),
        }
    }

    /// Item backed by a local file.
    #[must_use]
    pub fn from_path(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: ItemSource::Path(path.into()),
        }
    }
}

/// Broad category of an item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The item itself was unusable.
    Validation,
    /// Local filesystem failure.
    Resource,
    /// A mandatory external stage failed.
    ExternalTool,
    /// The item's task panicked.
    Panicked,
}

/// Serialisable description of why one item failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Failure category.
    pub reason: FailureReason,
    /// Human-readable message including the error chain.
    pub message: String,
}

impl ItemFailure {
    /// Failure recorded when an item's task panicked.
    #[must_use]
    pub fn panicked() -> Self {
        Self {
            reason: FailureReason::Panicked,
            message: "item task panicked".to_string(),
        }
    }

    /// Fold a pipeline error, including its source chain, into a failure record.
    #[must_use]
    pub fn from_error(err: &PipelineError) -> Self {
        let reason = match err {
            PipelineError::Validation { .. } => FailureReason::Validation,
            PipelineError::ExternalTool { .. } => FailureReason::ExternalTool,
            PipelineError::Resource { .. }
            | PipelineError::AggregateFailure { .. }
            | PipelineError::Archive { .. } => FailureReason::Resource,
        };
        let mut message = err.to_string();
        if let PipelineError::ExternalTool { stage, source } = err {
            message.push_str(&format!(" ({stage}: {})", source.program()));
        }
        let mut cause = err.source();
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = inner.source();
        }
        Self { reason, message }
    }
}

/// Terminal state of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The pipeline produced an output no larger than the input.
    Succeeded {
        /// Output file in the working directory.
        path: PathBuf,
        /// Output size in bytes.
        final_size: u64,
        /// Whether the original bytes were restored by the size check.
        reverted: bool,
    },
    /// The item produced no output.
    Failed {
        /// Reason for the failure.
        failure: ItemFailure,
    },
}

/// Record of one submitted item after its pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingItem {
    /// Position in the submission order.
    pub index: usize,
    /// Caller-supplied filename.
    pub original_name: String,
    /// Scratch copy of the input, removed once the pipeline returns.
    pub temp_input_path: PathBuf,
    /// Output location in the working directory.
    pub temp_output_path: PathBuf,
    /// Input size in bytes; zero when the input could not be persisted.
    pub original_size: u64,
    /// Terminal state.
    pub outcome: ItemOutcome,
}

impl ProcessingItem {
    /// Whether the item produced an output.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Succeeded { .. })
    }

    /// Output size for successful items.
    #[must_use]
    pub const fn final_size(&self) -> Option<u64> {
        match self.outcome {
            ItemOutcome::Succeeded { final_size, .. } => Some(final_size),
            ItemOutcome::Failed { .. } => None,
        }
    }

    /// Failure record for failed items.
    #[must_use]
    pub const fn failure(&self) -> Option<&ItemFailure> {
        match &self.outcome {
            ItemOutcome::Failed { failure } => Some(failure),
            ItemOutcome::Succeeded { .. } => None,
        }
    }

    /// Whether the size check restored the original bytes.
    #[must_use]
    pub const fn was_reverted(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Succeeded { reverted: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ToolError;
    use std::io;

    #[test]
    fn tool_failures_name_stage_and_program() {
        let err = PipelineError::ExternalTool {
            stage: "render",
            source: ToolError::Missing {
                program: "gs".into(),
            },
        };
        let failure = ItemFailure::from_error(&err);
        assert_eq!(failure.reason, FailureReason::ExternalTool);
        assert_eq!(
            failure.message,
            "external tool stage failed (render: gs): external tool not found"
        );
    }

    #[test]
    fn resource_failures_include_io_message() {
        let err = PipelineError::Resource {
            operation: "batch.persist_input",
            path: PathBuf::from("/tmp/x"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let failure = ItemFailure::from_error(&err);
        assert_eq!(failure.reason, FailureReason::Resource);
        assert_eq!(failure.message, "pipeline io failure: denied");
    }

    #[test]
    fn accessors_follow_outcome() {
        let ok = ProcessingItem {
            index: 0,
            original_name: "a.pdf".into(),
            temp_input_path: PathBuf::from("in"),
            temp_output_path: PathBuf::from("out"),
            original_size: 10,
            outcome: ItemOutcome::Succeeded {
                path: PathBuf::from("out"),
                final_size: 10,
                reverted: true,
            },
        };
        assert!(ok.is_success());
        assert!(ok.was_reverted());
        assert_eq!(ok.final_size(), Some(10));
        assert!(ok.failure().is_none());

        let failed = ProcessingItem {
            outcome: ItemOutcome::Failed {
                failure: ItemFailure::panicked(),
            },
            ..ok
        };
        assert!(!failed.is_success());
        assert_eq!(failed.final_size(), None);
        assert_eq!(
            failed.failure().map(|failure| failure.reason),
            Some(FailureReason::Panicked)
        );
    }

    #[test]
    fn failure_serialises_reason_in_snake_case() -> Result<(), Box<dyn std::error::Error>> {
        let value = serde_json::to_value(ItemFailure::panicked())?;
        assert_eq!(value["reason"], "panicked");
        Ok(())
    }
}
