//! Subprocess wrapper for the external tools the pipelines shell out to.
//!
//! # Design
//! - Children are spawned with `kill_on_drop` so abandoned requests reclaim them.
//! - A missing executable is reported distinctly from a non-zero exit.
//! - Stderr is captured and truncated for diagnostics rather than inherited.

use std::ffi::{OsStr, OsString};
use std::io;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

const STDERR_TAIL_BYTES: usize = 2048;

/// Errors produced while running an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The executable could not be found.
    #[error("external tool not found")]
    Missing {
        /// Program that was looked up.
        program: String,
    },
    /// The executable exists but could not be started.
    #[error("failed to spawn external tool")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The tool ran and exited unsuccessfully.
    #[error("external tool exited unsuccessfully")]
    Failed {
        /// Program that failed.
        program: String,
        /// Exit code, when the process was not killed by a signal.
        status: Option<i32>,
        /// Tail of the captured standard error.
        stderr: String,
    },
}

impl ToolError {
    /// Program the error refers to.
    #[must_use]
    pub fn program(&self) -> &str {
        match self {
            Self::Missing { program }
            | Self::Spawn { program, .. }
            | Self::Failed { program, .. } => program,
        }
    }
}

/// A single external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
}

impl ToolCommand {
    /// Start building an invocation of `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Program this command runs.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Run the command to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Missing`] when the executable cannot be found,
    /// [`ToolError::Spawn`] when it cannot be started, and
    /// [`ToolError::Failed`] when it exits with a non-zero status.
    pub async fn run(&self) -> Result<(), ToolError> {
        debug!(program = %self.program, args = self.args.len(), "running external tool");
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    ToolError::Missing {
                        program: self.program.clone(),
                    }
                } else {
                    ToolError::Spawn {
                        program: self.program.clone(),
                        source,
                    }
                }
            })?;

        if output.status.success() {
            return Ok(());
        }
        Err(ToolError::Failed {
            program: self.program.clone(),
            status: output.status.code(),
            stderr: stderr_tail(&output.stderr),
        })
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
