//! `POST /compress`.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State},
};
use pdfpress_core::Profile;
use tracing::info;

use crate::http::constants::FIELD_LEVEL;
use crate::http::errors::ApiError;
use crate::http::multipart::UploadForm;
use crate::models::CompressResponse;
use crate::state::ApiState;

pub(crate) async fn compress(
    State(state): State<Arc<ApiState>>,
    multipart: Multipart,
) -> Result<Json<CompressResponse>, ApiError> {
    let form = UploadForm::read(multipart).await?;
    let profile = Profile::parse_selector(form.field(FIELD_LEVEL))?;
    info!(files = form.files.len(), profile = %profile, "compression requested");

    let report = state.service.process_batch(form.files, profile).await?;
    Ok(Json(CompressResponse::from(&report)))
}
