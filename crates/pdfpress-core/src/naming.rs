//! Filename helpers for scratch artifacts, outputs, and archive entries.

use std::collections::HashSet;
use std::path::Path;

use uuid::Uuid;

const FALLBACK_NAME: &str = "document.pdf";

/// Last path component of a caller-supplied name, tolerating both separators.
pub(crate) fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|base| !base.is_empty() && *base != "." && *base != "..")
        .unwrap_or(FALLBACK_NAME)
}

/// Filesystem-safe form of a caller-supplied name, used inside generated paths.
pub(crate) fn sanitize(name: &str) -> String {
    let cleaned: String = basename(name)
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Token shared by every artifact of one batch: UTC seconds plus a short id.
pub(crate) fn batch_stamp(batch_id: Uuid) -> String {
    let simple = batch_id.simple().to_string();
    format!(
        "{}-{}",
        chrono::Utc::now().format("%Y%m%d%H%M%S"),
        &simple[..8]
    )
}

/// Reserve `name` in `used`, appending ` (n)` before the extension on collision.
pub(crate) fn unique_entry_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map_or_else(|| name.to_string(), |stem| stem.to_string_lossy().into_owned());
    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let mut counter = 1_usize;
    loop {
        let candidate = format!("{stem} ({counter}){extension}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}
