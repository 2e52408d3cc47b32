//! OCR pipeline handlers: preview, reparse, confirm

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use contendo_core::{ConfirmOutcome, ImportService};
use contendo_domain::{CandidateEvent, ContendoError, ImportBatch, UploadedFile};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::Session;
use crate::error::{rejected_items_response, ApiError};
use crate::AppContext;

/// POST /calendario/ocr/preview (multipart)
pub async fn preview(
    State(ctx): State<Arc<AppContext>>,
    Extension(session): Extension<Session>,
    mut multipart: Multipart,
) -> Result<Json<ImportBatch>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ContendoError::Validation(format!("malformed multipart body: {e}")))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime = field
            .content_type()
            .map(str::to_string)
            .or_else(|| mime_from_extension(&file_name))
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ContendoError::Validation(format!("failed to read upload: {e}")))?
            .to_vec();

        files.push(UploadedFile { name: file_name, mime, bytes });
    }

    info!(tenant_id = %session.tenant_id, files = files.len(), "ocr preview upload");
    let batch = ctx.import.preview(&session.tenant_id, &session.actor, files).await?;
    Ok(Json(batch))
}

#[derive(Debug, Deserialize)]
pub struct ReparseRequest {
    pub raw_text: String,
}

#[derive(Debug, Serialize)]
pub struct ReparseResponse {
    pub candidates: Vec<CandidateEvent>,
    pub skipped_lines: usize,
}

/// POST /calendario/ocr/reparse
///
/// Pure parsing over admin-edited raw text; persists nothing.
pub async fn reparse(Json(request): Json<ReparseRequest>) -> Json<ReparseResponse> {
    let parsed = ImportService::reparse(&request.raw_text);
    Json(ReparseResponse { candidates: parsed.candidates, skipped_lines: parsed.skipped_lines })
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub batch_id: String,
    pub items: Vec<CandidateEvent>,
    pub raw_text: Option<String>,
}

/// POST /calendario/ocr/confirmar
pub async fn confirm(
    State(ctx): State<Arc<AppContext>>,
    Extension(session): Extension<Session>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Response, ApiError> {
    let outcome = ctx
        .import
        .confirm(&session.tenant_id, &request.batch_id, request.items, request.raw_text)
        .await?;

    match outcome {
        ConfirmOutcome::Committed(batch) => Ok(Json(batch).into_response()),
        ConfirmOutcome::Rejected(errors) => Ok(rejected_items_response(&errors)),
    }
}

fn mime_from_extension(file_name: &str) -> Option<String> {
    let extension = file_name.rsplit('.').next()?.to_lowercase();
    let mime = match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tif" | "tiff" => "image/tiff",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime.to_string())
}
