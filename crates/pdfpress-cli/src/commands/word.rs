//! `pdfpress word`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use pdfpress_core::{ItemFailure, PipelineResult, WordConverter};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::cli::{CliContext, WordArgs};
use crate::commands::{check_inputs, emit, ensure_out_dir, output_targets};
use crate::error::{CliError, CliResult};
use crate::output::{display_name, docx_name, elapsed_line};

pub(crate) async fn handle_word(ctx: &CliContext, args: WordArgs) -> CliResult<()> {
    let started = Instant::now();
    let converter = WordConverter::from_tools(&ctx.config.tools);
    let mut stdout = io::stdout();
    let outcome = convert_files(
        &converter,
        &args.files,
        args.out.as_deref(),
        !args.no_sort,
        ctx.config.max_concurrent_jobs,
        &mut stdout,
    )
    .await;
    emit(&mut stdout, &elapsed_line(started.elapsed()))?;
    outcome.map(|_| ())
}

/// Convert every file concurrently, reporting in input order. Returns the
/// number of documents written.
pub(crate) async fn convert_files(
    converter: &WordConverter,
    files: &[PathBuf],
    out_dir: Option<&Path>,
    sort: bool,
    max_jobs: usize,
    out: &mut impl Write,
) -> CliResult<usize> {
    check_inputs(files)?;
    ensure_out_dir(out_dir).await?;

    let targets = output_targets(files, out_dir, docx_name);
    let gate = Arc::new(Semaphore::new(max_jobs.max(1)));
    let mut tasks = JoinSet::new();
    for (index, (input, target)) in files.iter().zip(targets).enumerate() {
        let converter = converter.clone();
        let gate = Arc::clone(&gate);
        let input = input.clone();
        tasks.spawn(async move {
            let _permit = gate.acquire_owned().await;
            let outcome = converter.convert(&input, &target, sort).await.map(|()| target);
            (index, outcome)
        });
    }

    let mut outcomes: Vec<Option<PipelineResult<PathBuf>>> = files.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => {
                if let Some(slot) = outcomes.get_mut(index) {
                    *slot = Some(outcome);
                }
            }
            Err(err) => warn!(error = %err, "conversion task did not complete"),
        }
    }

    let mut written = 0_usize;
    for (input, outcome) in files.iter().zip(outcomes) {
        let name = display_name(input);
        let line = match outcome {
            Some(Ok(target)) => {
                written += 1;
                format!("{name}: converted to {}", target.display())
            }
            Some(Err(err)) => format!("{name}: failed: {}", ItemFailure::from_error(&err).message),
            None => format!("{name}: failed: {}", ItemFailure::panicked().message),
        };
        emit(out, &line)?;
    }

    if written < files.len() {
        return Err(CliError::failure(anyhow!(
            "{} of {} files could not be converted",
            files.len() - written,
            files.len()
        )));
    }
    Ok(written)
}
