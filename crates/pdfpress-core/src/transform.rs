//! Transformation stages the compression pipeline is assembled from.
//!
//! # Design
//! - A stage reads one file and writes another; the trait boundary is path based.
//! - Tool-backed stages wrap [`ToolCommand`]; tests substitute in-process fakes.

use std::path::Path;

use async_trait::async_trait;

use crate::command::{ToolCommand, ToolError};
use crate::profile::Profile;

/// One external transformation step.
#[async_trait]
pub trait Transform: Send + Sync {
    /// Stage name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Read `input` and write the transformed document to `output`.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] when the underlying tool is missing or fails.
    async fn transform(&self, input: &Path, output: &Path, profile: Profile)
    -> Result<(), ToolError>;
}

/// Render stage: Ghostscript `pdfwrite` with the profile's parameters.
#[derive(Debug, Clone)]
pub struct GhostscriptStage {
    program: String,
}

impl GhostscriptStage {
    /// Stage backed by the given Ghostscript executable.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub(crate) fn command(&self, input: &Path, output: &Path, profile: Profile) -> ToolCommand {
        let mut target = std::ffi::OsString::from("-sOutputFile=");
        target.push(output);
        ToolCommand::new(&self.program)
            .args(profile.ghostscript_args())
            .arg(target)
            .arg(input)
    }
}

#[async_trait]
impl Transform for GhostscriptStage {
    fn name(&self) -> &'static str {
        "render"
    }

    async fn transform(
        &self,
        input: &Path,
        output: &Path,
        profile: Profile,
    ) -> Result<(), ToolError> {
        self.command(input, output, profile).run().await
    }
}

/// Structure stage: qpdf stream recompression and object-stream generation.
#[derive(Debug, Clone)]
pub struct QpdfStage {
    program: String,
}

impl QpdfStage {
    /// Stage backed by the given qpdf executable.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub(crate) fn command(&self, input: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.program)
            .args([
                "--recompress-flate",
                "--object-streams=generate",
                "--stream-data=compress",
                "--compression-level=9",
            ])
            .arg(input)
            .arg(output)
    }
}

#[async_trait]
impl Transform for QpdfStage {
    fn name(&self) -> &'static str {
        "structure"
    }

    async fn transform(
        &self,
        input: &Path,
        output: &Path,
        _profile: Profile,
    ) -> Result<(), ToolError> {
        self.command(input, output).run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn ghostscript_command_ends_with_output_then_input() {
        let stage = GhostscriptStage::new("gs");
        let command = stage.command(Path::new("/w/in.pdf"), Path::new("/w/out.pdf"), Profile::Screen);
        let args = command.arguments();
        assert_eq!(command.program(), "gs");
        assert_eq!(args[args.len() - 2], OsStr::new("-sOutputFile=/w/out.pdf"));
        assert_eq!(args[args.len() - 1], OsStr::new("/w/in.pdf"));
        assert!(args.iter().any(|arg| arg == "-dPDFSETTINGS=/screen"));
    }

    #[test]
    fn qpdf_command_uses_maximum_compression() {
        let stage = QpdfStage::new("qpdf");
        let command = stage.command(Path::new("a.pdf"), Path::new("b.pdf"));
        let args: Vec<_> = command
            .arguments()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "--recompress-flate",
                "--object-streams=generate",
                "--stream-data=compress",
                "--compression-level=9",
                "a.pdf",
                "b.pdf",
            ]
        );
    }

    #[tokio::test]
    async fn missing_ghostscript_surfaces_missing_error() {
        let stage = GhostscriptStage::new("pdfpress-definitely-missing-gs");
        let err = stage
            .transform(Path::new("in.pdf"), Path::new("out.pdf"), Profile::Ebook)
            .await
            .err();
        assert!(matches!(err, Some(ToolError::Missing { .. })));
        assert_eq!(stage.name(), "render");
        assert_eq!(QpdfStage::new("qpdf").name(), "structure");
    }
}
