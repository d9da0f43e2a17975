//! RFC9457-style API error wrapper.

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pdfpress_core::PipelineError;
use pdfpress_telemetry::RequestContext;
use tracing::{error, warn};

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_INTERNAL, PROBLEM_NOT_FOUND, PROBLEM_PAYLOAD_TOO_LARGE,
    PROBLEM_PROCESSING_FAILED, PROBLEM_SERVICE_UNAVAILABLE,
};
use crate::models::{ProblemDetails, ProblemInvalidParam};

/// Structured API error with optional RFC9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    pub(crate) invalid_params: Option<Vec<ProblemInvalidParam>>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            invalid_params: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn with_invalid_params(mut self, params: Vec<ProblemInvalidParam>) -> Self {
        self.invalid_params = Some(params);
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn payload_too_large(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            PROBLEM_PAYLOAD_TOO_LARGE,
            "upload too large",
        )
        .with_detail(detail)
    }

    pub(crate) fn processing_failed(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_PROCESSING_FAILED,
            "processing failed",
        )
        .with_detail(detail)
    }

    pub(crate) fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            PROBLEM_SERVICE_UNAVAILABLE,
            "service unavailable",
        )
        .with_detail(detail)
    }

    /// Reject a request parameter with a pointer to the offending form field.
    pub(crate) fn invalid_field(field: &str, reason: &str) -> Self {
        Self::bad_request(format!("invalid `{field}` field")).with_invalid_params(vec![
            ProblemInvalidParam {
                pointer: format!("/{field}"),
                message: reason.to_string(),
            },
        ])
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation { field, reason, .. } => Self::invalid_field(field, reason),
            PipelineError::AggregateFailure { submitted } => {
                warn!(submitted, "no uploaded file could be processed");
                Self::processing_failed(format!(
                    "none of the {submitted} uploaded files could be compressed"
                ))
            }
            PipelineError::ExternalTool { stage, source } => {
                error!(stage, program = source.program(), error = %source, "external tool failed");
                Self::processing_failed(format!("the `{stage}` stage failed"))
            }
            PipelineError::Archive {
                operation,
                path,
                source,
            } => {
                error!(operation, path = %path.display(), error = %source, "archive construction failed");
                Self::internal("failed to build the download archive")
            }
            PipelineError::Resource {
                operation,
                path,
                source,
            } => {
                error!(operation, path = %path.display(), error = %source, "pipeline io failure");
                Self::internal("failed to store processing artifacts")
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        warn!(error = %err, status = status.as_u16(), "rejected multipart body");
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::payload_too_large("upload exceeds the configured size limit")
        } else {
            Self::bad_request(err.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
            invalid_params: self.invalid_params,
            request_id: RequestContext::current()
                .map(|ctx| ctx.request_id().to_owned())
                .filter(|id| !id.is_empty()),
        };
        (self.status, Json(body)).into_response()
    }
}
