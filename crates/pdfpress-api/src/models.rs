//! Request and response bodies for the HTTP surface.

use pdfpress_core::{
    BatchReport, Classification, Delivery, FailureReason, ItemOutcome, Profile, WordReport,
    format_signed_size, format_size,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RFC9457-style problem document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short, constant summary.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Offending request parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
    /// `x-request-id` of the failed request, for matching against server logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON-pointer-like reference to the form field.
    pub pointer: String,
    /// Machine-readable reason.
    pub message: String,
}

/// Byte totals with human-readable renderings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TotalsView {
    /// Sum of original sizes over successful items.
    pub original_bytes: u64,
    /// Sum of final sizes over successful items.
    pub final_bytes: u64,
    /// Bytes saved; negative never occurs for delivered output.
    pub saved_bytes: i64,
    /// Savings percentage rounded to two decimals.
    pub saved_percent: f64,
    /// `original_bytes` rendered with binary units.
    pub original_size: String,
    /// `final_bytes` rendered with binary units.
    pub final_size: String,
    /// `saved_bytes` rendered with binary units.
    pub saved: String,
}

/// One successfully compressed file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompressedItemView {
    /// Position in the upload order.
    pub index: usize,
    /// Uploaded filename.
    pub name: String,
    /// Size before compression.
    pub original_size: u64,
    /// Size of the delivered file.
    pub final_size: u64,
    /// The original bytes were kept because compression did not help.
    pub reverted: bool,
}

/// One file that could not be compressed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedItemView {
    /// Position in the upload order.
    pub index: usize,
    /// Uploaded filename.
    pub name: String,
    /// Failure category.
    pub reason: FailureReason,
    /// Human-readable explanation.
    pub message: String,
}

/// Response body for `POST /compress`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompressResponse {
    /// Batch identifier.
    pub batch_id: Uuid,
    /// Original filename, or an archive description for multi-file batches.
    pub title: String,
    /// Profile applied to every file.
    pub profile: Profile,
    /// Aggregate sizes.
    pub totals: TotalsView,
    /// Whether anything was saved.
    pub classification: Classification,
    /// Single file or archive.
    pub delivery: Delivery,
    /// Filename to request from `/download/{filename}`.
    pub download: String,
    /// Relative URL of the download.
    pub download_url: String,
    /// Successful items in upload order.
    pub items: Vec<CompressedItemView>,
    /// Failed items in upload order.
    pub failed: Vec<FailedItemView>,
}

impl From<&BatchReport> for CompressResponse {
    fn from(report: &BatchReport) -> Self {
        let totals = report.summary.totals;
        let items = report
            .result
            .items
            .iter()
            .filter_map(|item| match &item.outcome {
                ItemOutcome::Succeeded {
                    final_size,
                    reverted,
                    ..
                } => Some(CompressedItemView {
                    index: item.index,
                    name: item.original_name.clone(),
                    original_size: item.original_size,
                    final_size: *final_size,
                    reverted: *reverted,
                }),
                ItemOutcome::Failed { .. } => None,
            })
            .collect();
        let failed = report
            .summary
            .failed
            .iter()
            .map(|item| FailedItemView {
                index: item.index,
                name: item.name.clone(),
                reason: item.failure.reason,
                message: item.failure.message.clone(),
            })
            .collect();

        Self {
            batch_id: report.result.batch_id,
            title: report.download.title.clone(),
            profile: report.result.profile,
            totals: TotalsView {
                original_bytes: totals.original_bytes,
                final_bytes: totals.final_bytes,
                saved_bytes: totals.saved_bytes,
                saved_percent: (totals.saved_percent * 100.0).round() / 100.0,
                original_size: format_size(totals.original_bytes),
                final_size: format_size(totals.final_bytes),
                saved: format_signed_size(totals.saved_bytes),
            },
            classification: report.summary.classification,
            delivery: report.summary.delivery,
            download_url: download_url(&report.download.file_name),
            download: report.download.file_name.clone(),
            items,
            failed,
        }
    }
}

/// Response body for `POST /convert-word`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConvertResponse {
    /// Uploaded filename.
    pub title: String,
    /// Filename to request from `/download/{filename}`.
    pub download: String,
    /// Relative URL of the download.
    pub download_url: String,
}

impl From<&WordReport> for ConvertResponse {
    fn from(report: &WordReport) -> Self {
        Self {
            title: report.download.title.clone(),
            download: report.download.file_name.clone(),
            download_url: download_url(&report.download.file_name),
        }
    }
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// `ok` when the working directory is reachable.
    pub status: String,
    /// Build identifier.
    pub build: String,
    /// Items currently being compressed.
    pub active_jobs: i64,
    /// Batches processed since start.
    pub batches_total: u64,
}

fn download_url(file_name: &str) -> String {
    format!("/download/{file_name}")
}
