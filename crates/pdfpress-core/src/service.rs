//! Entry points shared by the HTTP and CLI surfaces.
//!
//! # Design
//! - `process_batch` runs the coordinator, aggregates, then bundles when two or
//!   more items succeeded.
//! - `convert_word` persists one upload into a scratch directory and converts it
//!   into the working directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pdfpress_config::ServiceConfig;
use pdfpress_telemetry::Metrics;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregate::{BatchSummary, Delivery};
use crate::archive::{self, ArchiveEntry, ArchiveManifest};
use crate::batch::{BatchCoordinator, BatchResult};
use crate::convert::WordConverter;
use crate::error::{PipelineError, PipelineResult};
use crate::item::{ItemOutcome, ItemSource, SubmittedItem};
use crate::naming;
use crate::pipeline::CompressionPipeline;
use crate::profile::Profile;

/// The file a caller should download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Download {
    /// Heading for the result: the original filename or an archive description.
    pub title: String,
    /// Filename within the working directory.
    pub file_name: String,
    /// Full path of the file.
    pub path: PathBuf,
}

/// Everything produced by one batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Per-item records in submission order.
    pub result: BatchResult,
    /// Totals, classification, and failures.
    pub summary: BatchSummary,
    /// File to hand back.
    pub download: Download,
    /// Archive manifest when the batch was bundled.
    pub archive: Option<ArchiveManifest>,
}

/// Result of one Word conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordReport {
    /// Caller-supplied filename.
    pub original_name: String,
    /// Converted document.
    pub download: Download,
}

/// Batch compression and conversion over one working directory.
#[derive(Clone)]
pub struct CompressionService {
    coordinator: BatchCoordinator,
    converter: Arc<WordConverter>,
    work_dir: PathBuf,
}

impl CompressionService {
    /// Service wired to the external tools named in `config`.
    #[must_use]
    pub fn from_config(config: &ServiceConfig, metrics: Metrics) -> Self {
        Self::new(
            CompressionPipeline::from_tools(&config.tools),
            WordConverter::from_tools(&config.tools),
            config.upload_dir.clone(),
            config.max_concurrent_jobs,
            metrics,
        )
    }

    /// Service from explicit components.
    #[must_use]
    pub fn new(
        pipeline: CompressionPipeline,
        converter: WordConverter,
        work_dir: impl Into<PathBuf>,
        max_concurrent_jobs: usize,
        metrics: Metrics,
    ) -> Self {
        let work_dir = work_dir.into();
        Self {
            coordinator: BatchCoordinator::new(pipeline, work_dir.clone(), max_concurrent_jobs, metrics),
            converter: Arc::new(converter),
            work_dir,
        }
    }

    /// Working directory holding outputs and archives.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Compress every submitted item and prepare the download.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] for an empty submission,
    /// [`PipelineError::AggregateFailure`] when every item failed, and
    /// [`PipelineError::Archive`] when bundling fails.
    pub async fn process_batch(
        &self,
        submissions: Vec<SubmittedItem>,
        profile: Profile,
    ) -> PipelineResult<BatchReport> {
        let result = self.coordinator.run(submissions, profile).await?;
        let summary = match BatchSummary::from_result(&result) {
            Ok(summary) => summary,
            Err(err) => {
                warn!(error = %err, batch_id = %result.batch_id, "batch produced no output");
                return Err(err);
            }
        };

        let (download, archive) = match summary.delivery {
            Delivery::Direct => (Self::direct_download(&result)?, None),
            Delivery::Archive => {
                let entries = result
                    .items
                    .iter()
                    .filter_map(|item| match &item.outcome {
                        ItemOutcome::Succeeded { path, .. } => Some(ArchiveEntry {
                            name: item.original_name.clone(),
                            path: path.clone(),
                        }),
                        ItemOutcome::Failed { .. } => None,
                    })
                    .collect();
                let manifest = archive::build_archive(&self.work_dir, &result.stamp, entries).await?;
                let download = Download {
                    title: format!("Archive created from {} files", manifest.entries.len()),
                    file_name: manifest.file_name.clone(),
                    path: manifest.path.clone(),
                };
                (download, Some(manifest))
            }
        };

        info!(
            batch_id = %result.batch_id,
            saved_bytes = summary.totals.saved_bytes,
            saved_percent = summary.totals.saved_percent,
            download = %download.file_name,
            "batch delivered"
        );
        Ok(BatchReport {
            result,
            summary,
            download,
            archive,
        })
    }

    /// Convert one PDF into a Word document in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Resource`] for local IO failures and
    /// [`PipelineError::ExternalTool`] when the converter fails.
    pub async fn convert_word(
        &self,
        submission: SubmittedItem,
        sort: bool,
    ) -> PipelineResult<WordReport> {
        let id = Uuid::new_v4();
        let stamp = naming::batch_stamp(id);
        let scratch = self.work_dir.join(format!(".batch-{id}"));
        tokio::fs::create_dir_all(&scratch)
            .await
            .map_err(|source| PipelineError::io("convert.create_scratch", &scratch, source))?;

        let outcome = self.convert_in(&scratch, &stamp, &submission, sort).await;
        if let Err(err) = tokio::fs::remove_dir_all(&scratch).await {
            warn!(error = %err, path = %scratch.display(), "failed to remove conversion scratch directory");
        }
        let download = outcome?;
        Ok(WordReport {
            original_name: submission.name,
            download,
        })
    }

    async fn convert_in(
        &self,
        scratch: &Path,
        stamp: &str,
        submission: &SubmittedItem,
        sort: bool,
    ) -> PipelineResult<Download> {
        let safe_name = naming::sanitize(&submission.name);
        let input = scratch.join(format!("word_in_{stamp}_{safe_name}"));
        let persisted = match &submission.source {
            ItemSource::Bytes(bytes) => tokio::fs::write(&input, bytes).await,
            ItemSource::Path(path) => tokio::fs::copy(path, &input).await.map(|_| ()),
        };
        persisted.map_err(|source| PipelineError::io("convert.persist_input", &input, source))?;

        let stem = Path::new(&safe_name)
            .file_stem()
            .map_or_else(|| "document".into(), |stem| stem.to_string_lossy().into_owned());
        let file_name = format!("converted_{stamp}_{stem}.docx");
        let output = self.work_dir.join(&file_name);
        self.converter.convert(&input, &output, sort).await?;

        Ok(Download {
            title: naming::basename(&submission.name).to_string(),
            file_name,
            path: output,
        })
    }

    fn direct_download(result: &BatchResult) -> PipelineResult<Download> {
        result
            .items
            .iter()
            .find_map(|item| match &item.outcome {
                ItemOutcome::Succeeded { path, .. } => Some(Download {
                    title: item.original_name.clone(),
                    file_name: path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    path: path.clone(),
                }),
                ItemOutcome::Failed { .. } => None,
            })
            .ok_or(PipelineError::AggregateFailure {
                submitted: result.items.len(),
            })
    }
}
