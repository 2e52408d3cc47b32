//! Provider webhook handlers
//!
//! The notification endpoint is public: it authenticates by channel id and
//! token instead of a bearer session, answers fast, and dispatches the pull
//! on a background task.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use contendo_core::WebhookDisposition;
use contendo_domain::{ContendoError, WebhookChannel};
use tracing::{error, info};

use crate::auth::Session;
use crate::error::ApiError;
use crate::AppContext;

const CHANNEL_ID_HEADER: &str = "x-goog-channel-id";
const CHANNEL_TOKEN_HEADER: &str = "x-goog-channel-token";
const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";

/// POST /calendar-webhook (public, provider-signed)
pub async fn handle(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let channel_id = header_str(&headers, CHANNEL_ID_HEADER)
        .ok_or_else(|| ContendoError::Unauthorized("missing channel id header".into()))?;
    let channel_token = header_str(&headers, CHANNEL_TOKEN_HEADER);
    let resource_state = header_str(&headers, RESOURCE_STATE_HEADER);

    let disposition =
        ctx.webhook.verify_notification(channel_id, channel_token, resource_state).await?;

    match disposition {
        WebhookDisposition::Handshake => Ok(StatusCode::OK.into_response()),
        WebhookDisposition::TriggerPull { tenant_id } => {
            info!(tenant_id, "webhook notification accepted, dispatching pull");
            let sync = ctx.sync.clone();
            tokio::spawn(async move {
                match sync.sync_from_external(&tenant_id).await {
                    Ok(run) => info!(tenant_id, run_id = %run.id, "webhook-triggered pull finished"),
                    // A Conflict here just means a run was already in
                    // flight; it will pick up the same changes.
                    Err(e) => error!(tenant_id, error = %e, "webhook-triggered pull did not run"),
                }
            });
            Ok(StatusCode::ACCEPTED.into_response())
        }
    }
}

/// POST /calendar-webhook/setup
pub async fn setup(
    State(ctx): State<Arc<AppContext>>,
    Extension(session): Extension<Session>,
) -> Result<Json<WebhookChannel>, ApiError> {
    let channel = ctx.webhook.setup(&session.tenant_id).await?;
    Ok(Json(channel))
}

/// POST /calendar-webhook/stop
pub async fn stop(
    State(ctx): State<Arc<AppContext>>,
    Extension(session): Extension<Session>,
) -> Result<StatusCode, ApiError> {
    ctx.webhook.stop(&session.tenant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
