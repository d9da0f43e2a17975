//! Test fixtures and environment helpers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;

const PDF_HEADER: &[u8] = b"%PDF-1.4\n";
const FILLER: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz\n";

/// Create an isolated working directory that is removed when dropped.
///
/// # Errors
///
/// Returns an error when the temporary directory cannot be created.
pub fn scratch_dir() -> io::Result<TempDir> {
    tempfile::Builder::new().prefix("pdfpress-test-").tempdir()
}

/// Produce a payload of exactly `len` bytes that starts with a PDF header
/// when there is room for one.
#[must_use]
pub fn pdf_payload(len: usize) -> Vec<u8> {
    let mut payload = Vec::with_capacity(len);
    payload.extend(PDF_HEADER.iter().take(len));
    while payload.len() < len {
        let remaining = len - payload.len();
        payload.extend(FILLER.iter().take(remaining));
    }
    payload
}

/// Write a [`pdf_payload`] of `len` bytes to `dir/name` and return its path.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn write_payload(dir: &Path, name: &str, len: usize) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, pdf_payload(len))?;
    Ok(path)
}

/// Returns `true` if `program` can be launched from the current `PATH`.
///
/// Used to skip tests that need real Ghostscript or qpdf binaries.
#[must_use]
pub fn binary_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}
