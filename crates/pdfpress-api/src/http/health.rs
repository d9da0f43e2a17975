//! Health and metrics endpoints.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::Response,
};
use pdfpress_telemetry::build_sha;
use tracing::{error, warn};

use crate::http::errors::ApiError;
use crate::models::HealthResponse;
use crate::state::ApiState;

pub(crate) async fn health(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let work_dir = state.service.work_dir();
    match tokio::fs::metadata(work_dir).await {
        Ok(metadata) if metadata.is_dir() => {
            let snapshot = state.telemetry.snapshot();
            Ok(Json(HealthResponse {
                status: "ok".to_string(),
                build: build_sha().to_string(),
                active_jobs: snapshot.active_jobs,
                batches_total: snapshot.batches_total,
            }))
        }
        Ok(_) => {
            warn!(path = %work_dir.display(), "working directory is not a directory");
            Err(ApiError::service_unavailable(
                "working directory is unavailable",
            ))
        }
        Err(err) => {
            warn!(error = %err, path = %work_dir.display(), "working directory is unreachable");
            Err(ApiError::service_unavailable(
                "working directory is unavailable",
            ))
        }
    }
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.telemetry.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "failed to build metrics response");
                ApiError::internal("failed to build metrics response")
            }),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}
