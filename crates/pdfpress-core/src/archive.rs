//! Zip bundling of successful batch outputs.
//!
//! # Design
//! - Entries are named after the caller's original filenames (basename only),
//!   with ` (n)` suffixes for duplicates.
//! - Uniform skip-and-continue: an unreadable entry is skipped and reported; each
//!   entry is read fully before its zip record is started, so no partial entry is written.
//! - The build fails only when the container itself fails or nothing could be written.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{PipelineError, PipelineResult};
use crate::naming;

/// Low-level causes of an archive failure.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Filesystem failure on the archive file itself.
    #[error("archive io failure")]
    Io {
        /// Underlying IO error.
        source: io::Error,
    },
    /// Zip encoder failure.
    #[error("archive encoding failure")]
    Zip {
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
    /// Every entry was skipped.
    #[error("archive has no readable entries")]
    Empty {
        /// Number of entries that were skipped.
        skipped: usize,
    },
    /// The blocking build task did not complete.
    #[error("archive task did not complete")]
    Task {
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

/// One file to place in the archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Desired entry name, usually the caller's original filename.
    pub name: String,
    /// File holding the entry's bytes.
    pub path: PathBuf,
}

/// An entry left out of the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    /// Requested entry name.
    pub name: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Description of a written archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveManifest {
    /// Location of the archive.
    pub path: PathBuf,
    /// Archive filename within the working directory.
    pub file_name: String,
    /// Entry names, in write order.
    pub entries: Vec<String>,
    /// Entries that could not be read.
    pub skipped: Vec<SkippedEntry>,
}

/// Write `compressed_batch_<stamp>.zip` into `work_dir` holding `entries`.
///
/// # Errors
///
/// Returns [`PipelineError::Archive`] when the archive cannot be created or
/// finished, or when none of the entries could be read.
pub async fn build_archive(
    work_dir: &Path,
    stamp: &str,
    entries: Vec<ArchiveEntry>,
) -> PipelineResult<ArchiveManifest> {
    let file_name = format!("compressed_batch_{stamp}.zip");
    let path = work_dir.join(&file_name);
    let target = path.clone();
    let manifest = tokio::task::spawn_blocking(move || write_archive(&target, file_name, &entries))
        .await
        .map_err(|source| PipelineError::Archive {
            operation: "archive.join",
            path: path.clone(),
            source: ArchiveError::Task { source },
        })??;

    info!(
        path = %manifest.path.display(),
        entries = manifest.entries.len(),
        skipped = manifest.skipped.len(),
        "archive written"
    );
    Ok(manifest)
}

fn write_archive(
    path: &Path,
    file_name: String,
    entries: &[ArchiveEntry],
) -> PipelineResult<ArchiveManifest> {
    let fail = |operation: &'static str, source: ArchiveError| PipelineError::Archive {
        operation,
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(|source| fail("archive.create", ArchiveError::Io { source }))?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut used = HashSet::new();
    let mut written = Vec::with_capacity(entries.len());
    let mut skipped = Vec::new();

    for entry in entries {
        let bytes = match fs::read(&entry.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, path = %entry.path.display(), name = %entry.name, "skipping unreadable archive entry");
                skipped.push(SkippedEntry {
                    name: entry.name.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let name = naming::unique_entry_name(naming::basename(&entry.name), &mut used);
        writer
            .start_file(name.as_str(), options)
            .map_err(|source| fail("archive.start_entry", ArchiveError::Zip { source }))?;
        writer
            .write_all(&bytes)
            .map_err(|source| fail("archive.write_entry", ArchiveError::Io { source }))?;
        written.push(name);
    }

    writer
        .finish()
        .map_err(|source| fail("archive.finish", ArchiveError::Zip { source }))?;

    if written.is_empty() {
        if let Err(err) = fs::remove_file(path) {
            warn!(error = %err, path = %path.display(), "failed to remove empty archive");
        }
        return Err(fail(
            "archive.entries",
            ArchiveError::Empty {
                skipped: skipped.len(),
            },
        ));
    }

    Ok(ArchiveManifest {
        path: path.to_path_buf(),
        file_name,
        entries: written,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfpress_test_support::fixtures::{scratch_dir, write_payload};
    use std::error::Error;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_entries(path: &Path) -> Result<Vec<(String, Vec<u8>)>, Box<dyn Error>> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let mut entries = Vec::new();
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)?;
            entries.push((file.name().to_string(), bytes));
        }
        Ok(entries)
    }

    #[tokio::test]
    async fn entries_use_original_names() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let a = write_payload(dir.path(), "compressed_x_0_a.pdf", 300)?;
        let b = write_payload(dir.path(), "compressed_x_1_b.pdf", 200)?;

        let manifest = build_archive(
            dir.path(),
            "x",
            vec![
                ArchiveEntry { name: "report.pdf".into(), path: a.clone() },
                ArchiveEntry { name: "uploads/slides.pdf".into(), path: b.clone() },
            ],
        )
        .await?;

        assert_eq!(manifest.file_name, "compressed_batch_x.zip");
        assert_eq!(manifest.entries, ["report.pdf", "slides.pdf"]);
        assert!(manifest.skipped.is_empty());
        let entries = read_entries(&manifest.path)?;
        assert_eq!(entries[0].0, "report.pdf");
        assert_eq!(entries[0].1, fs::read(&a)?);
        assert_eq!(entries[1].1, fs::read(&b)?);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_names_are_disambiguated() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let a = write_payload(dir.path(), "one", 10)?;
        let b = write_payload(dir.path(), "two", 20)?;

        let manifest = build_archive(
            dir.path(),
            "dup",
            vec![
                ArchiveEntry { name: "same.pdf".into(), path: a },
                ArchiveEntry { name: "same.pdf".into(), path: b },
            ],
        )
        .await?;
        assert_eq!(manifest.entries, ["same.pdf", "same (1).pdf"]);
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_entries_are_skipped() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let a = write_payload(dir.path(), "ok", 10)?;

        let manifest = build_archive(
            dir.path(),
            "skip",
            vec![
                ArchiveEntry { name: "gone.pdf".into(), path: dir.path().join("missing") },
                ArchiveEntry { name: "ok.pdf".into(), path: a },
            ],
        )
        .await?;
        assert_eq!(manifest.entries, ["ok.pdf"]);
        assert_eq!(manifest.skipped.len(), 1);
        assert_eq!(manifest.skipped[0].name, "gone.pdf");
        assert_eq!(read_entries(&manifest.path)?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn nothing_readable_fails_and_leaves_no_archive() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let err = build_archive(
            dir.path(),
            "empty",
            vec![ArchiveEntry { name: "gone.pdf".into(), path: dir.path().join("missing") }],
        )
        .await
        .err();
        assert!(matches!(
            err,
            Some(PipelineError::Archive {
                source: ArchiveError::Empty { skipped: 1 },
                ..
            })
        ));
        assert!(!dir.path().join("compressed_batch_empty.zip").exists());
        Ok(())
    }

    #[tokio::test]
    async fn missing_work_dir_fails_container_creation() -> Result<(), Box<dyn Error>> {
        let dir = scratch_dir()?;
        let a = write_payload(dir.path(), "ok", 10)?;
        let err = build_archive(
            &dir.path().join("absent"),
            "nodir",
            vec![ArchiveEntry { name: "ok.pdf".into(), path: a }],
        )
        .await
        .err();
        assert!(matches!(
            err,
            Some(PipelineError::Archive { operation: "archive.create", .. })
        ));
        Ok(())
    }
}
