//! Command handlers.

pub(crate) mod compress;
pub(crate) mod word;

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::error::{CliError, CliResult};
use crate::output::numbered_name;

/// Reject inputs that are not regular files before any work starts.
pub(crate) fn check_inputs(files: &[PathBuf]) -> CliResult<()> {
    match files.iter().find(|file| !file.is_file()) {
        Some(file) => Err(CliError::validation(format!(
            "{} is not a readable file",
            file.display()
        ))),
        None => Ok(()),
    }
}

/// Directory receiving the output for `input`.
pub(crate) fn target_dir<'a>(out_dir: Option<&'a Path>, input: &'a Path) -> &'a Path {
    out_dir.unwrap_or_else(|| input.parent().unwrap_or_else(|| Path::new(".")))
}

/// One output path per input, named by `name`. Inputs that would land on the
/// same path get ` (2)`, ` (3)`, ... suffixes in input order.
pub(crate) fn output_targets(
    files: &[PathBuf],
    out_dir: Option<&Path>,
    name: impl Fn(&Path) -> String,
) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    files
        .iter()
        .map(|input| {
            let dir = target_dir(out_dir, input);
            let base = name(input);
            let mut candidate = dir.join(&base);
            let mut n = 2_usize;
            while !taken.insert(candidate.clone()) {
                candidate = dir.join(numbered_name(&base, n));
                n += 1;
            }
            candidate
        })
        .collect()
}

pub(crate) async fn ensure_out_dir(out_dir: Option<&Path>) -> CliResult<()> {
    if let Some(dir) = out_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))
            .map_err(CliError::failure)?;
    }
    Ok(())
}

pub(crate) fn emit(out: &mut impl Write, line: &str) -> CliResult<()> {
    writeln!(out, "{line}").map_err(CliError::failure)
}
