//! `POST /convert-word`.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State},
};
use tracing::info;

use crate::http::constants::{FIELD_PDF, FIELD_SORT};
use crate::http::errors::ApiError;
use crate::http::multipart::UploadForm;
use crate::models::ConvertResponse;
use crate::state::ApiState;

pub(crate) async fn convert_word(
    State(state): State<Arc<ApiState>>,
    multipart: Multipart,
) -> Result<Json<ConvertResponse>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let sort = sort_enabled(form.field(FIELD_SORT));
    let upload = match form.files.len() {
        0 => return Err(ApiError::invalid_field(FIELD_PDF, "missing")),
        1 => form.files.remove(0),
        _ => return Err(ApiError::invalid_field(FIELD_PDF, "single_file_expected")),
    };
    info!(file_name = %upload.name, sort, "word conversion requested");

    let report = state.service.convert_word(upload, sort).await?;
    Ok(Json(ConvertResponse::from(&report)))
}

/// Column sorting stays on unless the form says `false` or `0`.
fn sort_enabled(value: Option<&str>) -> bool {
    !value
        .map(|value| value.trim().to_ascii_lowercase())
        .is_some_and(|value| value == "false" || value == "0")
}
