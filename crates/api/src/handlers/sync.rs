//! Sync trigger and status handlers

use std::sync::Arc;

use axum::extract::State;
use axum::{Extension, Json};
use contendo_domain::{SyncRun, SyncState};

use crate::auth::Session;
use crate::error::ApiError;
use crate::AppContext;

/// POST /calendar-sync/to-google
pub async fn to_google(
    State(ctx): State<Arc<AppContext>>,
    Extension(session): Extension<Session>,
) -> Result<Json<SyncRun>, ApiError> {
    let run = ctx.sync.sync_to_external(&session.tenant_id).await?;
    Ok(Json(run))
}

/// POST /calendar-sync/from-google
pub async fn from_google(
    State(ctx): State<Arc<AppContext>>,
    Extension(session): Extension<Session>,
) -> Result<Json<SyncRun>, ApiError> {
    let run = ctx.sync.sync_from_external(&session.tenant_id).await?;
    Ok(Json(run))
}

/// POST /calendar-sync/bidirectional
pub async fn bidirectional(
    State(ctx): State<Arc<AppContext>>,
    Extension(session): Extension<Session>,
) -> Result<Json<SyncRun>, ApiError> {
    let run = ctx.sync.sync_bidirectional(&session.tenant_id).await?;
    Ok(Json(run))
}

/// GET /calendar-sync/status
pub async fn status(
    State(ctx): State<Arc<AppContext>>,
    Extension(session): Extension<Session>,
) -> Result<Json<SyncState>, ApiError> {
    let state = ctx.sync.status(&session.tenant_id).await?;
    Ok(Json(state))
}

/// GET /calendar-sync/history
pub async fn history(
    State(ctx): State<Arc<AppContext>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<SyncRun>>, ApiError> {
    let runs = ctx.sync.history(&session.tenant_id).await?;
    Ok(Json(runs))
}
