//! Two-stage compression run for a single file.
//!
//! # Design
//! - The render stage is mandatory; the structure stage falls back to the render output.
//! - The final output is never larger than the input: a non-shrinking candidate is
//!   replaced by a byte-identical copy of the input.
//! - Intermediates live beside the input and are removed on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pdfpress_config::ToolPaths;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::profile::Profile;
use crate::transform::{GhostscriptStage, QpdfStage, Transform};

/// Sizes and decisions recorded by one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Input size in bytes.
    pub original_size: u64,
    /// Output size in bytes; never exceeds `original_size`.
    pub final_size: u64,
    /// Whether the input bytes were restored because the candidate did not shrink.
    pub reverted: bool,
    /// Whether the structure stage failed and the render output was used instead.
    pub structure_fallback: bool,
}

/// Render then restructure a document, keeping whichever of candidate and input is smaller.
#[derive(Clone)]
pub struct CompressionPipeline {
    render: Arc<dyn Transform>,
    structure: Arc<dyn Transform>,
}

impl CompressionPipeline {
    /// Pipeline from explicit stages.
    #[must_use]
    pub fn new(render: Arc<dyn Transform>, structure: Arc<dyn Transform>) -> Self {
        Self { render, structure }
    }

    /// Pipeline backed by the configured Ghostscript and qpdf executables.
    #[must_use]
    pub fn from_tools(tools: &ToolPaths) -> Self {
        Self::new(
            Arc::new(GhostscriptStage::new(&tools.ghostscript)),
            Arc::new(QpdfStage::new(&tools.qpdf)),
        )
    }

    /// Compress `input` into `output` under `profile`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ExternalTool`] when the render stage fails and
    /// [`PipelineError::Resource`] on local IO failures. Structure-stage
    /// failures are absorbed.
    pub async fn run(
        &self,
        input: &Path,
        output: &Path,
        profile: Profile,
    ) -> PipelineResult<PipelineOutcome> {
        let original_size = file_size("pipeline.input_metadata", input).await?;
        log_stage_size("original", input, original_size);

        let render_path = intermediate_path(input, output, "render");
        let structure_path = intermediate_path(input, output, "structure");
        let _guard = IntermediateGuard::new([render_path.clone(), structure_path.clone()]);

        self.render
            .transform(input, &render_path, profile)
            .await
            .map_err(|source| PipelineError::tool(self.render.name(), source))?;
        let render_size = file_size("pipeline.render_metadata", &render_path).await?;
        log_stage_size(self.render.name(), &render_path, render_size);

        let (candidate, candidate_size, structure_fallback) = match self
            .structure
            .transform(&render_path, &structure_path, profile)
            .await
        {
            Ok(()) => {
                let size = file_size("pipeline.structure_metadata", &structure_path).await?;
                log_stage_size(self.structure.name(), &structure_path, size);
                (structure_path.as_path(), size, false)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    program = err.program(),
                    stage = self.structure.name(),
                    path = %input.display(),
                    "structure stage failed; using render output"
                );
                (render_path.as_path(), render_size, true)
            }
        };

        if candidate_size >= original_size {
            info!(
                path = %input.display(),
                original_size,
                candidate_size,
                profile = %profile,
                "output did not shrink; restoring original bytes"
            );
            tokio::fs::copy(input, output)
                .await
                .map_err(|source| PipelineError::io("pipeline.revert_copy", output, source))?;
            return Ok(PipelineOutcome {
                original_size,
                final_size: original_size,
                reverted: true,
                structure_fallback,
            });
        }

        tokio::fs::copy(candidate, output)
            .await
            .map_err(|source| PipelineError::io("pipeline.publish_output", output, source))?;
        log_stage_size("final", output, candidate_size);
        Ok(PipelineOutcome {
            original_size,
            final_size: candidate_size,
            reverted: false,
            structure_fallback,
        })
    }
}

fn intermediate_path(input: &Path, output: &Path, stage: &str) -> PathBuf {
    let file_name = output
        .file_name()
        .map_or_else(|| "output".into(), |name| name.to_string_lossy().into_owned());
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{file_name}.{stage}.pdf"))
}

async fn file_size(operation: &'static str, path: &Path) -> PipelineResult<u64> {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .map_err(|source| PipelineError::io(operation, path, source))
}

#[allow(clippy::cast_precision_loss)]
fn log_stage_size(stage: &str, path: &Path, bytes: u64) {
    let megabytes = bytes as f64 / (1024.0 * 1024.0);
    debug!(stage, path = %path.display(), bytes, megabytes, "stage artifact size");
}

/// Removes intermediate artifacts when dropped.
struct IntermediateGuard {
    paths: Vec<PathBuf>,
}

impl IntermediateGuard {
    fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }
}

impl Drop for IntermediateGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(error = %err, path = %path.display(), "failed to remove intermediate");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ToolError;
    use async_trait::async_trait;
    use pdfpress_test_support::fixtures::{pdf_payload, scratch_dir, write_payload};
    use std::error::Error;

    /// Writes a fixed fraction of the input to the output.
    struct Scale {
        name: &'static str,
        numerator: u64,
        denominator: u64,
    }

    #[async_trait]
    impl Transform for Scale {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn transform(
            &self,
            input: &Path,
            output: &Path,
            _profile: Profile,
        ) -> Result<(), ToolError> {
            let bytes = std::fs::read(input).map_err(|source| ToolError::Spawn {
                program: self.name.into(),
                source,
            })?;
            let len = usize::try_from(
                bytes.len() as u64 * self.numerator / self.denominator,
            )
            .unwrap_or(usize::MAX);
            std::fs::write(output, pdf_payload(len)).map_err(|source| ToolError::Spawn {
                program: self.name.into(),
                source,
            })
        }
    }

    struct Broken(&'static str);

    #[async_trait]
    impl Transform for Broken {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn transform(&self, _: &Path, _: &Path, _: Profile) -> Result<(), ToolError> {
            Err(ToolError::Missing {
                program: self.0.into(),
            })
        }
    }

    fn scale(name: &'static str, numerator: u64, denominator: u64) -> Arc<dyn Transform> {
        Arc::new(Scale {
            name,
            numerator,
            denominator,
        })
    }

    fn leftovers(dir: &Path) -> Result<Vec<String>, Box<dyn Error>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.ends_with(".render.pdf") || name.ends_with(".structure.pdf") {
                names.push(name);
            }
        }
        Ok(names)
    }

    #[tokio::test]
    async fn shrinking_output_is_published() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let input = write_payload(dir.path(), "in.pdf", 1000)?;
        let output = dir.path().join("out.pdf");
        let pipeline = CompressionPipeline::new(scale("render", 1, 2), scale("structure", 4, 5));

        let outcome = pipeline.run(&input, &output, Profile::Ebook).await?;
        assert_eq!(outcome.original_size, 1000);
        assert_eq!(outcome.final_size, 400);
        assert!(!outcome.reverted);
        assert!(!outcome.structure_fallback);
        assert_eq!(std::fs::metadata(&output)?.len(), 400);
        assert!(leftovers(dir.path())?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn growing_output_reverts_to_original_bytes() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let input = write_payload(dir.path(), "in.pdf", 2048)?;
        let output = dir.path().join("out.pdf");
        let pipeline = CompressionPipeline::new(scale("render", 5, 4), scale("structure", 1, 1));

        let outcome = pipeline.run(&input, &output, Profile::Screen).await?;
        assert!(outcome.reverted);
        assert_eq!(outcome.final_size, outcome.original_size);
        assert_eq!(std::fs::read(&output)?, std::fs::read(&input)?);
        assert!(leftovers(dir.path())?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn equal_size_output_also_reverts() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let input = write_payload(dir.path(), "in.pdf", 512)?;
        let output = dir.path().join("out.pdf");
        let pipeline = CompressionPipeline::new(scale("render", 1, 1), scale("structure", 1, 1));

        let outcome = pipeline.run(&input, &output, Profile::Printer).await?;
        assert!(outcome.reverted);
        assert_eq!(std::fs::read(&output)?, std::fs::read(&input)?);
        Ok(())
    }

    #[tokio::test]
    async fn structure_failure_falls_back_to_render_output() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let input = write_payload(dir.path(), "in.pdf", 1000)?;
        let output = dir.path().join("out.pdf");
        let pipeline =
            CompressionPipeline::new(scale("render", 3, 10), Arc::new(Broken("structure")));

        let outcome = pipeline.run(&input, &output, Profile::Extreme).await?;
        assert!(outcome.structure_fallback);
        assert_eq!(outcome.final_size, 300);
        assert_eq!(std::fs::metadata(&output)?.len(), 300);
        assert!(leftovers(dir.path())?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn render_failure_fails_the_item() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let input = write_payload(dir.path(), "in.pdf", 100)?;
        let output = dir.path().join("out.pdf");
        let pipeline = CompressionPipeline::new(Arc::new(Broken("render")), scale("structure", 1, 2));

        let err = pipeline.run(&input, &output, Profile::Ebook).await.err();
        assert!(matches!(
            err,
            Some(PipelineError::ExternalTool {
                stage: "render",
                source: ToolError::Missing { .. }
            })
        ));
        assert!(!output.exists());
        assert!(leftovers(dir.path())?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_input_is_a_resource_error() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let pipeline = CompressionPipeline::new(scale("render", 1, 2), scale("structure", 1, 2));
        let err = pipeline
            .run(&dir.path().join("absent.pdf"), &dir.path().join("out.pdf"), Profile::Ebook)
            .await
            .err();
        assert!(matches!(
            err,
            Some(PipelineError::Resource {
                operation: "pipeline.input_metadata",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn intermediates_sit_beside_the_input() {
        let path = intermediate_path(
            Path::new("/work/.batch-1/in_a.pdf"),
            Path::new("/work/compressed_a.pdf"),
            "render",
        );
        assert_eq!(path, Path::new("/work/.batch-1/compressed_a.pdf.render.pdf"));
    }
}
