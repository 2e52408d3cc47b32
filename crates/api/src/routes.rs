//! Router configuration for the REST surface.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use contendo_domain::constants::{MAX_IMPORT_FILES, MAX_IMPORT_FILE_BYTES};
use tower_http::cors::CorsLayer;

use crate::handlers::{imports, ocr, sync, webhook};
use crate::{auth, AppContext};

/// Create the main router with all routes.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    // Admin surface: bearer session + role + module gate.
    let admin = Router::new()
        // Import batches
        .route("/calendario/importaciones", get(imports::list_import_batches))
        .route("/calendario/importaciones/{id}", get(imports::get_import_detail))
        .route("/calendario/importaciones-compare", get(imports::compare_imports))
        .route("/calendario/importaciones/{id}/deshacer", post(imports::undo_import))
        // OCR pipeline
        .route("/calendario/ocr/preview", post(ocr::preview))
        .route("/calendario/ocr/reparse", post(ocr::reparse))
        .route("/calendario/ocr/confirmar", post(ocr::confirm))
        // Sync engine
        .route("/calendar-sync/to-google", post(sync::to_google))
        .route("/calendar-sync/from-google", post(sync::from_google))
        .route("/calendar-sync/bidirectional", post(sync::bidirectional))
        .route("/calendar-sync/status", get(sync::status))
        .route("/calendar-sync/history", get(sync::history))
        // Webhook channel management
        .route("/calendar-webhook/setup", post(webhook::setup))
        .route("/calendar-webhook/stop", post(webhook::stop))
        // Layers run outermost-last: authenticate first, then the gate.
        .layer(middleware::from_fn_with_state(ctx.clone(), auth::require_calendar_module))
        .layer(middleware::from_fn_with_state(ctx.clone(), auth::authenticate))
        .layer(DefaultBodyLimit::max(MAX_IMPORT_FILES * MAX_IMPORT_FILE_BYTES + 1024 * 1024));

    Router::new()
        // Public: authenticated by channel id + token instead of a session.
        .route("/calendar-webhook", post(webhook::handle))
        .merge(admin)
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
