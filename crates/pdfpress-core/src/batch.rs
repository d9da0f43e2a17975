//! Bounded fan-out of pipeline runs with ordered fan-in.
//!
//! # Design
//! - Every item gets its own task; a shared semaphore bounds how many run at once.
//! - Tasks return their finished [`ProcessingItem`] by value and a single collector
//!   places it by index, so the result order is the submission order.
//! - A failing or panicking item never affects its siblings.
//! - Temporary inputs and intermediates live in a per-batch scratch directory that is
//!   removed when the batch finishes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pdfpress_telemetry::{ItemOutcomeLabel, Metrics};
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::item::{ItemFailure, ItemOutcome, ItemSource, ProcessingItem, SubmittedItem};
use crate::naming;
use crate::pipeline::CompressionPipeline;
use crate::profile::Profile;

/// Ordered outcome of one batch.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Identifier of the batch.
    pub batch_id: Uuid,
    /// Token embedded in every artifact name of the batch.
    pub stamp: String,
    /// Profile applied to every item.
    pub profile: Profile,
    /// One record per submitted item; index `i` holds input `i`.
    pub items: Vec<ProcessingItem>,
}

impl BatchResult {
    /// Successful items, in submission order.
    pub fn successes(&self) -> impl Iterator<Item = &ProcessingItem> {
        self.items.iter().filter(|item| item.is_success())
    }

    /// Failed items, in submission order.
    pub fn failures(&self) -> impl Iterator<Item = &ProcessingItem> {
        self.items.iter().filter(|item| !item.is_success())
    }
}

/// Runs one pipeline per submitted item under a shared concurrency gate.
#[derive(Clone)]
pub struct BatchCoordinator {
    pipeline: Arc<CompressionPipeline>,
    gate: Arc<Semaphore>,
    work_dir: PathBuf,
    metrics: Metrics,
}

#[derive(Clone)]
struct ItemContext {
    pipeline: Arc<CompressionPipeline>,
    gate: Arc<Semaphore>,
    work_dir: PathBuf,
    scratch_dir: PathBuf,
    stamp: String,
    profile: Profile,
    metrics: Metrics,
}

impl BatchCoordinator {
    /// Coordinator writing outputs into `work_dir` with at most
    /// `max_concurrent_jobs` pipeline runs in flight.
    #[must_use]
    pub fn new(
        pipeline: CompressionPipeline,
        work_dir: impl Into<PathBuf>,
        max_concurrent_jobs: usize,
        metrics: Metrics,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            gate: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            work_dir: work_dir.into(),
            metrics,
        }
    }

    /// Working directory receiving outputs.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Process every submitted item and return them in submission order.
    ///
    /// Item-level failures are recorded on the item; only problems with the
    /// batch as a whole are returned as errors.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] for an empty submission and
    /// [`PipelineError::Resource`] when the scratch directory cannot be created.
    pub async fn run(
        &self,
        submissions: Vec<SubmittedItem>,
        profile: Profile,
    ) -> PipelineResult<BatchResult> {
        if submissions.is_empty() {
            return Err(PipelineError::invalid("files", "empty_submission", None));
        }

        let batch_id = Uuid::new_v4();
        let stamp = naming::batch_stamp(batch_id);
        let scratch_dir = self.work_dir.join(format!(".batch-{batch_id}"));
        tokio::fs::create_dir_all(&scratch_dir)
            .await
            .map_err(|source| PipelineError::io("batch.create_scratch", &scratch_dir, source))?;

        let submitted = submissions.len();
        info!(batch_id = %batch_id, items = submitted, profile = %profile, "batch started");
        self.metrics.inc_batch();

        let context = ItemContext {
            pipeline: Arc::clone(&self.pipeline),
            gate: Arc::clone(&self.gate),
            work_dir: self.work_dir.clone(),
            scratch_dir: scratch_dir.clone(),
            stamp: stamp.clone(),
            profile,
            metrics: self.metrics.clone(),
        };

        let names: Vec<String> = submissions.iter().map(|item| item.name.clone()).collect();
        let mut tasks = JoinSet::new();
        let mut owners: HashMap<task::Id, usize> = HashMap::with_capacity(submitted);
        for (index, submission) in submissions.into_iter().enumerate() {
            let context = context.clone();
            let handle = tasks.spawn(async move { process_item(index, submission, context).await });
            owners.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<ProcessingItem>> = vec![None; submitted];
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, item)) => {
                    let index = item.index;
                    slots[index] = Some(item);
                }
                Err(err) => match owners.get(&err.id()) {
                    Some(&index) => {
                        error!(error = %err, item_index = index, name = %names[index], "item task panicked");
                    }
                    None => error!(error = %err, "batch task failed without an owner"),
                },
            }
        }

        let items: Vec<ProcessingItem> = slots
            .into_iter()
            .zip(names)
            .enumerate()
            .map(|(index, (slot, name))| slot.unwrap_or_else(|| lost_item(index, name, &context)))
            .collect();

        for item in &items {
            self.metrics.inc_item(outcome_label(item));
        }

        if let Err(err) = tokio::fs::remove_dir_all(&scratch_dir).await {
            warn!(error = %err, path = %scratch_dir.display(), "failed to remove batch scratch directory");
        }

        let succeeded = items.iter().filter(|item| item.is_success()).count();
        info!(
            batch_id = %batch_id,
            submitted,
            succeeded,
            failed = submitted - succeeded,
            "batch finished"
        );

        Ok(BatchResult {
            batch_id,
            stamp,
            profile,
            items,
        })
    }
}

async fn process_item(
    index: usize,
    submission: SubmittedItem,
    context: ItemContext,
) -> ProcessingItem {
    let safe_name = naming::sanitize(&submission.name);
    let temp_input_path = context
        .scratch_dir
        .join(format!("in_{}_{index}_{safe_name}", context.stamp));
    let temp_output_path = context
        .work_dir
        .join(format!("compressed_{}_{index}_{safe_name}", context.stamp));

    // The gate is never closed, so a failed acquire only means running unthrottled.
    let permit = Arc::clone(&context.gate).acquire_owned().await.ok();
    let job = ActiveJob::start(&context.metrics);
    debug!(item_index = index, name = %submission.name, "item admitted");

    let result = run_item(&submission.source, &temp_input_path, &temp_output_path, &context).await;
    drop(job);
    drop(permit);

    if let Err(err) = tokio::fs::remove_file(&temp_input_path).await
        && err.kind() != std::io::ErrorKind::NotFound
    {
        warn!(error = %err, path = %temp_input_path.display(), "failed to remove temp input");
    }

    let (original_size, outcome) = match result {
        Ok(outcome) => outcome,
        Err((original_size, err)) => {
            warn!(error = %err, item_index = index, name = %submission.name, "item failed");
            (
                original_size,
                ItemOutcome::Failed {
                    failure: ItemFailure::from_error(&err),
                },
            )
        }
    };

    ProcessingItem {
        index,
        original_name: submission.name,
        temp_input_path,
        temp_output_path,
        original_size,
        outcome,
    }
}

async fn run_item(
    source: &ItemSource,
    temp_input: &Path,
    temp_output: &Path,
    context: &ItemContext,
) -> Result<(u64, ItemOutcome), (u64, PipelineError)> {
    let persisted = match source {
        ItemSource::Bytes(bytes) => tokio::fs::write(temp_input, bytes).await,
        ItemSource::Path(path) => tokio::fs::copy(path, temp_input).await.map(|_| ()),
    };
    persisted.map_err(|source| (0, PipelineError::io("batch.persist_input", temp_input, source)))?;

    let original_size = tokio::fs::metadata(temp_input)
        .await
        .map(|meta| meta.len())
        .map_err(|source| (0, PipelineError::io("batch.input_metadata", temp_input, source)))?;

    let outcome = context
        .pipeline
        .run(temp_input, temp_output, context.profile)
        .await
        .map_err(|err| (original_size, err))?;

    if outcome.final_size < outcome.original_size {
        context
            .metrics
            .add_bytes_saved(outcome.original_size - outcome.final_size);
    }

    Ok((
        outcome.original_size,
        ItemOutcome::Succeeded {
            path: temp_output.to_path_buf(),
            final_size: outcome.final_size,
            reverted: outcome.reverted,
        },
    ))
}

/// Keeps the active-jobs gauge balanced even when the item task unwinds.
struct ActiveJob<'a> {
    metrics: &'a Metrics,
}

impl<'a> ActiveJob<'a> {
    fn start(metrics: &'a Metrics) -> Self {
        metrics.job_started();
        Self { metrics }
    }
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        self.metrics.job_finished();
    }
}

fn lost_item(index: usize, name: String, context: &ItemContext) -> ProcessingItem {
    let safe_name = naming::sanitize(&name);
    ProcessingItem {
        index,
        temp_input_path: context
            .scratch_dir
            .join(format!("in_{}_{index}_{safe_name}", context.stamp)),
        temp_output_path: context
            .work_dir
            .join(format!("compressed_{}_{index}_{safe_name}", context.stamp)),
        original_name: name,
        original_size: 0,
        outcome: ItemOutcome::Failed {
            failure: ItemFailure::panicked(),
        },
    }
}

const fn outcome_label(item: &ProcessingItem) -> ItemOutcomeLabel {
    match item.outcome {
        ItemOutcome::Succeeded { reverted: true, .. } => ItemOutcomeLabel::Reverted,
        ItemOutcome::Succeeded { .. } => ItemOutcomeLabel::Compressed,
        ItemOutcome::Failed { .. } => ItemOutcomeLabel::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ToolError;
    use crate::item::FailureReason;
    use crate::transform::Transform;
    use async_trait::async_trait;
    use pdfpress_test_support::fixtures::{pdf_payload, scratch_dir};
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Halves its input; inputs of `panic_on` bytes panic instead.
    struct Halve {
        panic_on: Option<usize>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Halve {
        fn new(panic_on: Option<usize>) -> Self {
            Self {
                panic_on,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transform for Halve {
        fn name(&self) -> &'static str {
            "render"
        }

        async fn transform(&self, input: &Path, output: &Path, _: Profile) -> Result<(), ToolError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            let len = std::fs::metadata(input).map_or(0, |meta| meta.len());
            let len = usize::try_from(len).unwrap_or(0);
            // Larger inputs finish first so completion order differs from submission order.
            tokio::time::sleep(Duration::from_millis(60_u64.saturating_sub(len as u64 / 100))).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            assert!(self.panic_on != Some(len), "simulated tool crash");
            std::fs::write(output, pdf_payload(len / 2)).map_err(|source| ToolError::Spawn {
                program: "halve".into(),
                source,
            })
        }
    }

    struct Passthrough;

    #[async_trait]
    impl Transform for Passthrough {
        fn name(&self) -> &'static str {
            "structure"
        }

        async fn transform(&self, input: &Path, output: &Path, _: Profile) -> Result<(), ToolError> {
            std::fs::copy(input, output)
                .map(|_| ())
                .map_err(|source| ToolError::Spawn {
                    program: "copy".into(),
                    source,
                })
        }
    }

    fn coordinator(
        render: Arc<Halve>,
        work_dir: &Path,
        jobs: usize,
    ) -> Result<BatchCoordinator, Box<dyn Error>> {
        let pipeline = CompressionPipeline::new(render, Arc::new(Passthrough));
        Ok(BatchCoordinator::new(pipeline, work_dir, jobs, Metrics::new()?))
    }

    #[tokio::test]
    async fn empty_submission_is_rejected() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let batch = coordinator(Arc::new(Halve::new(None)), dir.path(), 2)?;
        let err = batch.run(Vec::new(), Profile::Ebook).await.err();
        assert!(matches!(
            err,
            Some(PipelineError::Validation {
                field: "files",
                reason: "empty_submission",
                ..
            })
        ));
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn results_follow_submission_order() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let batch = coordinator(Arc::new(Halve::new(None)), dir.path(), 4)?;
        let submissions = (0..4)
            .map(|i| SubmittedItem::from_bytes(format!("doc-{i}.pdf"), pdf_payload(1000 * (i + 1))))
            .collect();

        let result = batch.run(submissions, Profile::Ebook).await?;
        let names: Vec<_> = result.items.iter().map(|item| item.original_name.as_str()).collect();
        assert_eq!(names, ["doc-0.pdf", "doc-1.pdf", "doc-2.pdf", "doc-3.pdf"]);
        for (index, item) in result.items.iter().enumerate() {
            assert_eq!(item.index, index);
            assert_eq!(item.original_size, 1000 * (index as u64 + 1));
            assert_eq!(item.final_size(), Some(500 * (index as u64 + 1)));
            assert!(item.temp_output_path.exists());
            assert!(!item.temp_input_path.exists());
        }
        Ok(())
    }

    #[tokio::test]
    async fn semaphore_bounds_concurrency() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let render = Arc::new(Halve::new(None));
        let batch = coordinator(Arc::clone(&render), dir.path(), 2)?;
        let submissions = (0..6)
            .map(|i| SubmittedItem::from_bytes(format!("{i}.pdf"), pdf_payload(400)))
            .collect();

        let result = batch.run(submissions, Profile::Screen).await?;
        assert_eq!(result.successes().count(), 6);
        assert!(render.peak.load(Ordering::SeqCst) <= 2);
        Ok(())
    }

    #[tokio::test]
    async fn panicking_item_is_isolated() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let batch = coordinator(Arc::new(Halve::new(Some(777))), dir.path(), 3)?;
        let submissions = vec![
            SubmittedItem::from_bytes("ok-a.pdf", pdf_payload(1000)),
            SubmittedItem::from_bytes("boom.pdf", pdf_payload(777)),
            SubmittedItem::from_bytes("ok-b.pdf", pdf_payload(2000)),
        ];

        let result = batch.run(submissions, Profile::Ebook).await?;
        assert!(result.items[0].is_success());
        assert!(result.items[2].is_success());
        assert_eq!(result.items[1].original_name, "boom.pdf");
        assert_eq!(
            result.items[1].failure().map(|failure| failure.reason),
            Some(FailureReason::Panicked)
        );
        assert_eq!(result.failures().count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_path_source_fails_only_that_item() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let batch = coordinator(Arc::new(Halve::new(None)), dir.path(), 2)?;
        let submissions = vec![
            SubmittedItem::from_path("missing.pdf", dir.path().join("nope.pdf")),
            SubmittedItem::from_bytes("fine.pdf", pdf_payload(800)),
        ];

        let result = batch.run(submissions, Profile::Ebook).await?;
        let failure = result.items[0].failure().cloned();
        assert_eq!(failure.map(|failure| failure.reason), Some(FailureReason::Resource));
        assert_eq!(result.items[0].original_size, 0);
        assert!(result.items[1].is_success());
        Ok(())
    }

    #[tokio::test]
    async fn scratch_directory_is_removed_and_metrics_recorded() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let metrics = Metrics::new()?;
        let pipeline = CompressionPipeline::new(Arc::new(Halve::new(None)), Arc::new(Passthrough));
        let batch = BatchCoordinator::new(pipeline, dir.path(), 2, metrics.clone());

        let result = batch
            .run(
                vec![SubmittedItem::from_bytes("a.pdf", pdf_payload(1000))],
                Profile::Ebook,
            )
            .await?;
        assert!(!dir.path().join(format!(".batch-{}", result.batch_id)).exists());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.batches_total, 1);
        assert_eq!(snapshot.items_compressed, 1);
        assert_eq!(snapshot.bytes_saved_total, 500);
        assert_eq!(snapshot.active_jobs, 0);
        Ok(())
    }

    #[test]
    fn outcome_labels_distinguish_reverts() {
        let item = ProcessingItem {
            index: 0,
            original_name: "a.pdf".into(),
            temp_input_path: PathBuf::new(),
            temp_output_path: PathBuf::new(),
            original_size: 1,
            outcome: ItemOutcome::Succeeded {
                path: PathBuf::new(),
                final_size: 1,
                reverted: true,
            },
        };
        assert_eq!(outcome_label(&item), ItemOutcomeLabel::Reverted);
    }
}
