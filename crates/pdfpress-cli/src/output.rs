//! Renderers and naming helpers for command output.

use std::path::Path;
use std::time::Duration;

use pdfpress_core::{BatchTotals, format_size};

/// `<stem>_compressed<ext>` for an input path.
pub(crate) fn compressed_name(input: &Path) -> String {
    let stem = file_stem(input);
    input
        .extension()
        .map_or_else(
            || format!("{stem}_compressed"),
            |ext| format!("{stem}_compressed.{}", ext.to_string_lossy()),
        )
}

/// `<stem>.docx` for an input path.
pub(crate) fn docx_name(input: &Path) -> String {
    format!("{}.docx", file_stem(input))
}

/// `name` with ` (n)` inserted before its extension.
pub(crate) fn numbered_name(name: &str, n: usize) -> String {
    let path = Path::new(name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!(
            "{} ({n}).{}",
            stem.to_string_lossy(),
            ext.to_string_lossy()
        ),
        _ => format!("{name} ({n})"),
    }
}

/// Display name of an input: its final path component.
pub(crate) fn display_name(input: &Path) -> String {
    input.file_name().map_or_else(
        || input.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// `name: Saved X% (A -> B)`.
pub(crate) fn savings_line(name: &str, original: u64, final_size: u64) -> String {
    let totals = BatchTotals::from_sizes([(original, final_size)]);
    format!(
        "{name}: Saved {:.1}% ({} -> {})",
        totals.saved_percent,
        format_size(original),
        format_size(final_size)
    )
}

pub(crate) fn reverted_line(name: &str) -> String {
    format!("{name}: compression did not reduce the size; original kept")
}

pub(crate) fn elapsed_line(elapsed: Duration) -> String {
    format!("Finished in {:.2}s", elapsed.as_secs_f64())
}

fn file_stem(input: &Path) -> String {
    input
        .file_stem()
        .map_or_else(|| "document".to_string(), |stem| stem.to_string_lossy().into_owned())
}
