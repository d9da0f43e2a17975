//! Shared HTTP constants (headers, form fields, problem URIs).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

pub(crate) const FIELD_PDF: &str = "pdf";
pub(crate) const FIELD_LEVEL: &str = "level";
pub(crate) const FIELD_SORT: &str = "sort";
pub(crate) const FALLBACK_UPLOAD_NAME: &str = "document.pdf";

pub(crate) const PROBLEM_INTERNAL: &str = "https://pdfpress.dev/problems/internal";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://pdfpress.dev/problems/bad-request";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://pdfpress.dev/problems/not-found";
pub(crate) const PROBLEM_PAYLOAD_TOO_LARGE: &str =
    "https://pdfpress.dev/problems/payload-too-large";
pub(crate) const PROBLEM_PROCESSING_FAILED: &str =
    "https://pdfpress.dev/problems/processing-failed";
pub(crate) const PROBLEM_SERVICE_UNAVAILABLE: &str =
    "https://pdfpress.dev/problems/service-unavailable";
