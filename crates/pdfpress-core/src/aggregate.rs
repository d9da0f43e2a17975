//! Batch totals, classification, and delivery shape.
//!
//! # Design
//! - Totals cover successful items only; failed items contribute nothing.
//! - A batch with no success is an error, never an empty report.

use serde::{Deserialize, Serialize};

use crate::batch::BatchResult;
use crate::error::{PipelineError, PipelineResult};
use crate::item::ItemFailure;

const SIZE_UNITS: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

/// Byte totals over the successful items of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchTotals {
    /// Sum of original sizes.
    pub original_bytes: u64,
    /// Sum of final sizes.
    pub final_bytes: u64,
    /// `original_bytes - final_bytes`.
    pub saved_bytes: i64,
    /// Savings as a percentage of `original_bytes`; zero when that is zero.
    pub saved_percent: f64,
}

impl BatchTotals {
    /// Totals for the given `(original, final)` size pairs.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_sizes(sizes: impl IntoIterator<Item = (u64, u64)>) -> Self {
        let (original_bytes, final_bytes) = sizes
            .into_iter()
            .fold((0_u64, 0_u64), |(orig, fin), (o, f)| {
                (orig.saturating_add(o), fin.saturating_add(f))
            });
        let saved = i128::from(original_bytes) - i128::from(final_bytes);
        let saved_bytes = i64::try_from(saved).unwrap_or(if saved < 0 { i64::MIN } else { i64::MAX });
        let saved_percent = if original_bytes == 0 {
            0.0
        } else {
            saved_bytes as f64 / original_bytes as f64 * 100.0
        };
        Self {
            original_bytes,
            final_bytes,
            saved_bytes,
            saved_percent,
        }
    }
}

/// Whether the batch saved anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// At least one byte was saved.
    Improved,
    /// Nothing was saved.
    NoGain,
}

/// How the batch output is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// The single successful output is served as-is.
    Direct,
    /// Two or more outputs are bundled into an archive.
    Archive,
}

/// A failed item as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    /// Position in the submission order.
    pub index: usize,
    /// Caller-supplied filename.
    pub name: String,
    /// Why the item failed.
    pub failure: ItemFailure,
}

/// Aggregated view of a finished batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Totals over successful items.
    pub totals: BatchTotals,
    /// Savings classification.
    pub classification: Classification,
    /// Delivery shape.
    pub delivery: Delivery,
    /// Indices of successful items, in submission order.
    pub succeeded: Vec<usize>,
    /// Failed items, in submission order.
    pub failed: Vec<FailedItem>,
}

impl BatchSummary {
    /// Summarise a batch.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AggregateFailure`] when no item succeeded.
    pub fn from_result(result: &BatchResult) -> PipelineResult<Self> {
        let succeeded: Vec<usize> = result.successes().map(|item| item.index).collect();
        if succeeded.is_empty() {
            return Err(PipelineError::AggregateFailure {
                submitted: result.items.len(),
            });
        }

        let totals = BatchTotals::from_sizes(
            result
                .successes()
                .filter_map(|item| item.final_size().map(|size| (item.original_size, size))),
        );
        let classification = if totals.saved_bytes > 0 {
            Classification::Improved
        } else {
            Classification::NoGain
        };
        let delivery = if succeeded.len() == 1 {
            Delivery::Direct
        } else {
            Delivery::Archive
        };
        let failed = result
            .failures()
            .filter_map(|item| {
                item.failure().map(|failure| FailedItem {
                    index: item.index,
                    name: item.original_name.clone(),
                    failure: failure.clone(),
                })
            })
            .collect();

        Ok(Self {
            totals,
            classification,
            delivery,
            succeeded,
            failed,
        })
    }
}

/// Render a byte count with binary units: `512 B`, `1.50 KB`, `2.00 MB`, up to `EB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut divisor = UNIT;
    let mut exponent = 0;
    let mut remaining = bytes / UNIT;
    while remaining >= UNIT {
        divisor *= UNIT;
        exponent += 1;
        remaining /= UNIT;
    }
    format!(
        "{:.2} {}B",
        bytes as f64 / divisor as f64,
        SIZE_UNITS[exponent]
    )
}

/// [`format_size`] for signed quantities such as savings.
#[must_use]
pub fn format_signed_size(bytes: i64) -> String {
    let magnitude = format_size(bytes.unsigned_abs());
    if bytes < 0 {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}
