//! `pdfpress compress`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, anyhow};
use pdfpress_core::{
    BatchCoordinator, BatchTotals, CompressionPipeline, ItemOutcome, Profile, SubmittedItem,
};
use tracing::info;

use crate::cli::{CliContext, CompressArgs};
use crate::commands::{check_inputs, emit, ensure_out_dir, output_targets};
use crate::error::{CliError, CliResult};
use crate::output::{compressed_name, display_name, elapsed_line, reverted_line, savings_line};

pub(crate) async fn handle_compress(ctx: &CliContext, args: CompressArgs) -> CliResult<()> {
    let started = Instant::now();
    let scratch = tempfile::tempdir()
        .context("creating scratch directory")
        .map_err(CliError::failure)?;
    let coordinator = BatchCoordinator::new(
        CompressionPipeline::from_tools(&ctx.config.tools),
        scratch.path(),
        ctx.config.max_concurrent_jobs,
        ctx.metrics.clone(),
    );

    let mut stdout = io::stdout();
    let outcome = compress_files(
        &coordinator,
        &args.files,
        args.level,
        args.out.as_deref(),
        &mut stdout,
    )
    .await;
    emit(&mut stdout, &elapsed_line(started.elapsed()))?;
    outcome.map(|_| ())
}

/// Compress `files`, copy each result next to its input (or into `out_dir`),
/// and write one report line per file.
pub(crate) async fn compress_files(
    coordinator: &BatchCoordinator,
    files: &[PathBuf],
    profile: Profile,
    out_dir: Option<&Path>,
    out: &mut impl Write,
) -> CliResult<BatchTotals> {
    check_inputs(files)?;
    ensure_out_dir(out_dir).await?;
    let targets = output_targets(files, out_dir, compressed_name);

    let submissions = files
        .iter()
        .map(|file| SubmittedItem::from_path(display_name(file), file.clone()))
        .collect();
    let result = coordinator
        .run(submissions, profile)
        .await
        .context("running compression batch")
        .map_err(CliError::failure)?;

    let mut sizes = Vec::new();
    let mut failed = 0_usize;
    for ((item, input), target) in result.items.iter().zip(files).zip(&targets) {
        match &item.outcome {
            ItemOutcome::Succeeded {
                path,
                final_size,
                reverted,
            } => {
                tokio::fs::copy(path, target)
                    .await
                    .with_context(|| format!("writing {}", target.display()))
                    .map_err(CliError::failure)?;
                info!(input = %input.display(), output = %target.display(), "compressed file written");
                emit(
                    out,
                    &savings_line(&item.original_name, item.original_size, *final_size),
                )?;
                if *reverted {
                    emit(out, &reverted_line(&item.original_name))?;
                }
                sizes.push((item.original_size, *final_size));
            }
            ItemOutcome::Failed { failure } => {
                failed += 1;
                emit(
                    out,
                    &format!("{}: failed: {}", item.original_name, failure.message),
                )?;
            }
        }
    }

    let totals = BatchTotals::from_sizes(sizes.iter().copied());
    if sizes.len() > 1 {
        emit(out, &savings_line("Total", totals.original_bytes, totals.final_bytes))?;
    }
    if failed > 0 {
        return Err(CliError::failure(anyhow!(
            "{failed} of {} files could not be compressed",
            result.items.len()
        )));
    }
    Ok(totals)
}
