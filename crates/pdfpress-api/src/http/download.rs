//! `GET /download/{filename}`.

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_stream::stream;
use axum::{
    body::Body,
    extract::{Path as AxumPath, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::Response,
};
use futures_core::Stream;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};

use crate::http::errors::ApiError;
use crate::state::ApiState;

const CHUNK_BYTES: usize = 64 * 1024;

pub(crate) async fn download(
    State(state): State<Arc<ApiState>>,
    AxumPath(file_name): AxumPath<String>,
) -> Result<Response, ApiError> {
    if !is_plain_name(&file_name) {
        return Err(ApiError::invalid_field("filename", "not_a_plain_name"));
    }
    let path = state.service.work_dir().join(&file_name);
    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ApiError::not_found(format!("`{file_name}` is not available")));
        }
        Err(err) => {
            error!(error = %err, path = %path.display(), "failed to open download");
            return Err(ApiError::internal("failed to read download"));
        }
    };
    let metadata = file.metadata().await.map_err(|err| {
        error!(error = %err, path = %path.display(), "failed to stat download");
        ApiError::internal("failed to read download")
    })?;
    if !metadata.is_file() {
        return Err(ApiError::not_found(format!("`{file_name}` is not available")));
    }
    info!(file_name = %file_name, bytes = metadata.len(), "serving download");

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type(&file_name))
        .header(CONTENT_LENGTH, metadata.len())
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        )
        .body(Body::from_stream(file_chunks(file)))
        .map_err(|err| {
            error!(error = %err, "failed to build download response");
            ApiError::internal("failed to build download response")
        })
}

/// Read `file` in fixed-size chunks; a read error ends the stream after being yielded.
fn file_chunks(mut file: File) -> impl Stream<Item = io::Result<Vec<u8>>> + Send + 'static {
    stream! {
        let mut buffer = vec![0_u8; CHUNK_BYTES];
        loop {
            match file.read(&mut buffer).await {
                Ok(0) => break,
                Ok(read) => yield Ok(buffer[..read].to_vec()),
                Err(err) => {
                    warn!(error = %err, "download stream interrupted");
                    yield Err(err);
                    break;
                }
            }
        }
    }
}

/// A single visible path component with no quoting or control characters.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name
            .chars()
            .any(|ch| matches!(ch, '/' | '\\' | '"') || ch.is_control())
        && Path::new(name).file_name().is_some_and(|file| file == name)
}

fn content_type(name: &str) -> &'static str {
    match Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}
