//! PDF to Word conversion.
//!
//! # Design
//! - Images and vector art are stripped first on a best-effort basis; when that
//!   fails the original document is used.
//! - The `.docx` writer is mandatory and backed by a Python script. A copy of
//!   the script is compiled in and used when none is configured or deployed.
//! - The stripped intermediate lives in a private temporary directory, never
//!   beside the caller's files, and is removed on every exit path.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use pdfpress_config::ToolPaths;
use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::command::{ToolCommand, ToolError};
use crate::error::{PipelineError, PipelineResult};
use crate::profile::Profile;
use crate::transform::Transform;

const SCRIPT_NAME: &str = "convert_word.py";
const SCRIPT_SEARCH_PATHS: &[&str] = &["scripts/convert_word.py", "/app/scripts/convert_word.py"];
const BUNDLED_SCRIPT: &str = include_str!("../scripts/convert_word.py");

/// Produces a `.docx` document from a PDF.
#[async_trait]
pub trait DocxWriter: Send + Sync {
    /// Convert `input` into `output`, sorting text into reading columns when `sort` is set.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] when the converter is missing or fails.
    async fn write_docx(&self, input: &Path, output: &Path, sort: bool) -> Result<(), ToolError>;
}

/// Ghostscript pass that drops raster images and vector graphics, keeping text.
#[derive(Debug, Clone)]
pub struct ImageStripStage {
    program: String,
}

impl ImageStripStage {
    /// Stage backed by the given Ghostscript executable.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Transform for ImageStripStage {
    fn name(&self) -> &'static str {
        "strip"
    }

    async fn transform(&self, input: &Path, output: &Path, _: Profile) -> Result<(), ToolError> {
        ToolCommand::new(&self.program)
            .arg("-o")
            .arg(output)
            .args([
                "-sDEVICE=pdfwrite",
                "-dCompatibilityLevel=1.4",
                "-dFILTERIMAGE",
                "-dFILTERVECTOR",
            ])
            .arg(input)
            .run()
            .await
    }
}

/// Where the conversion script was found for one run.
#[derive(Debug)]
pub enum ScriptLocation {
    /// A script file that already exists on disk.
    OnDisk(PathBuf),
    /// The compiled-in script written to a temporary file; deleted on drop.
    Bundled(TempPath),
}

impl ScriptLocation {
    /// Path to pass to the interpreter.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::OnDisk(path) => path,
            Self::Bundled(temp) => temp,
        }
    }
}

/// [`DocxWriter`] that runs the Python conversion script.
#[derive(Debug, Clone)]
pub struct PythonDocxWriter {
    python: String,
    script: Option<PathBuf>,
}

impl PythonDocxWriter {
    /// Writer using `python`. Without an explicit `script` the search paths
    /// are tried, then the bundled copy.
    #[must_use]
    pub fn new(python: impl Into<String>, script: Option<PathBuf>) -> Self {
        Self {
            python: python.into(),
            script,
        }
    }

    /// Resolve the conversion script location.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Missing`] when a configured script does not exist
    /// and [`ToolError::Spawn`] when the bundled copy cannot be written.
    pub fn locate_script(&self) -> Result<ScriptLocation, ToolError> {
        if let Some(configured) = &self.script {
            return if configured.is_file() {
                Ok(ScriptLocation::OnDisk(configured.clone()))
            } else {
                Err(ToolError::Missing {
                    program: configured.display().to_string(),
                })
            };
        }
        if let Some(found) = SCRIPT_SEARCH_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
        {
            return Ok(ScriptLocation::OnDisk(found));
        }
        write_bundled_script().map(ScriptLocation::Bundled)
    }
}

fn write_bundled_script() -> Result<TempPath, ToolError> {
    let spawn_error = |source| ToolError::Spawn {
        program: SCRIPT_NAME.to_string(),
        source,
    };
    let mut file = tempfile::Builder::new()
        .prefix("pdfpress-convert-word-")
        .suffix(".py")
        .tempfile()
        .map_err(spawn_error)?;
    file.write_all(BUNDLED_SCRIPT.as_bytes()).map_err(spawn_error)?;
    let path = file.into_temp_path();
    debug!(path = %path.display(), "using bundled conversion script");
    Ok(path)
}

#[async_trait]
impl DocxWriter for PythonDocxWriter {
    async fn write_docx(&self, input: &Path, output: &Path, sort: bool) -> Result<(), ToolError> {
        let script = self.locate_script()?;
        ToolCommand::new(&self.python)
            .arg(script.path())
            .arg(input)
            .arg(output)
            .arg(if sort { "true" } else { "false" })
            .run()
            .await
    }
}

/// Two-step PDF to Word conversion.
#[derive(Clone)]
pub struct WordConverter {
    strip: Arc<dyn Transform>,
    writer: Arc<dyn DocxWriter>,
}

impl WordConverter {
    /// Converter from explicit components.
    #[must_use]
    pub fn new(strip: Arc<dyn Transform>, writer: Arc<dyn DocxWriter>) -> Self {
        Self { strip, writer }
    }

    /// Converter backed by the configured Ghostscript, Python, and script paths.
    #[must_use]
    pub fn from_tools(tools: &ToolPaths) -> Self {
        Self::new(
            Arc::new(ImageStripStage::new(&tools.ghostscript)),
            Arc::new(PythonDocxWriter::new(&tools.python, tools.word_script.clone())),
        )
    }

    /// Convert `input` into the `.docx` file at `output`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ExternalTool`] when the writer fails and
    /// [`PipelineError::Resource`] when the scratch directory or the fallback
    /// copy cannot be created.
    pub async fn convert(&self, input: &Path, output: &Path, sort: bool) -> PipelineResult<()> {
        let scratch = tempfile::Builder::new()
            .prefix("pdfpress-word-")
            .tempdir()
            .map_err(|source| {
                PipelineError::io("convert.create_scratch", &std::env::temp_dir(), source)
            })?;
        let cleaned = scratch.path().join("stripped.pdf");

        if let Err(err) = self.strip.transform(input, &cleaned, Profile::default()).await {
            warn!(
                error = %err,
                program = err.program(),
                path = %input.display(),
                "image strip failed; converting original document"
            );
            tokio::fs::copy(input, &cleaned)
                .await
                .map_err(|source| PipelineError::io("convert.fallback_copy", &cleaned, source))?;
        }

        self.writer
            .write_docx(&cleaned, output, sort)
            .await
            .map_err(|source| PipelineError::tool("docx", source))?;

        if let Err(err) = scratch.close() {
            warn!(error = %err, "failed to remove conversion scratch directory");
        }
        info!(input = %input.display(), output = %output.display(), sort, "word conversion finished");
        Ok(())
    }
}
