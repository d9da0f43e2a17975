//! Multipart form collection shared by the upload handlers.

use std::collections::HashMap;

use axum::extract::Multipart;
use pdfpress_core::SubmittedItem;
use tracing::debug;

use crate::http::constants::{FALLBACK_UPLOAD_NAME, FIELD_PDF};
use crate::http::errors::ApiError;

/// Files and text fields of one upload form.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub(crate) files: Vec<SubmittedItem>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// Drain the multipart body. Every `pdf` field becomes one item in arrival order.
    pub(crate) async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if name == FIELD_PDF {
                let file_name = field
                    .file_name()
                    .map(str::trim)
                    .filter(|file_name| !file_name.is_empty())
                    .unwrap_or(FALLBACK_UPLOAD_NAME)
                    .to_string();
                let bytes = field.bytes().await?;
                debug!(file_name = %file_name, bytes = bytes.len(), "received upload");
                form.files.push(SubmittedItem::from_bytes(file_name, bytes.to_vec()));
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}
