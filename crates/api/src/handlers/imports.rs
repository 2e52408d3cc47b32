//! Import batch handlers

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use contendo_domain::{BatchComparison, ImportBatch, ImportBatchSummary};
use serde::Deserialize;
use tracing::info;

use crate::auth::Session;
use crate::error::ApiError;
use crate::AppContext;

/// GET /calendario/importaciones
pub async fn list_import_batches(
    State(ctx): State<Arc<AppContext>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<ImportBatchSummary>>, ApiError> {
    let batches = ctx.import.list_batches(&session.tenant_id).await?;
    Ok(Json(batches))
}

/// GET /calendario/importaciones/{id}
pub async fn get_import_detail(
    State(ctx): State<Arc<AppContext>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<ImportBatch>, ApiError> {
    let batch = ctx.import.get_batch(&session.tenant_id, &id).await?;
    Ok(Json(batch))
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    a: Option<String>,
    b: Option<String>,
}

/// GET /calendario/importaciones-compare?a=&b=
pub async fn compare_imports(
    State(ctx): State<Arc<AppContext>>,
    Extension(session): Extension<Session>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<BatchComparison>, ApiError> {
    let comparison = ctx
        .import
        .compare(&session.tenant_id, query.a.as_deref(), query.b.as_deref())
        .await?;
    Ok(Json(comparison))
}

/// POST /calendario/importaciones/{id}/deshacer
pub async fn undo_import(
    State(ctx): State<Arc<AppContext>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<ImportBatch>, ApiError> {
    info!(tenant_id = %session.tenant_id, batch_id = %id, "undo requested");
    let batch = ctx.import.undo(&session.tenant_id, &id).await?;
    Ok(Json(batch))
}
