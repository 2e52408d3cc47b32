//! Bearer-token authentication and module gating
//!
//! The bearer token resolves to an explicit `Session` extension carried
//! through the request; handlers never consult ambient state. Admin routes
//! additionally pass the per-tenant calendar module gate, whose behavior on
//! a missing record is explicit configuration (`gating_fail_open`).

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use contendo_domain::constants::CALENDAR_MODULE;
use contendo_domain::{ContendoError, Role};
use contendo_infra::ModuleFlags;
use tracing::{debug, warn};

use crate::error::{forbidden_response, ApiError};
use crate::AppContext;

/// Authenticated request identity
#[derive(Debug, Clone)]
pub struct Session {
    pub tenant_id: String,
    pub role: Role,
    /// Audit label recorded as `created_by` on writes.
    pub actor: String,
}

/// Resolve the bearer token into a `Session` extension, or 401.
pub async fn authenticate(
    State(ctx): State<Arc<AppContext>>,
    mut request: Request,
    next: Next,
) -> Response {
    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = bearer else {
        return ApiError(ContendoError::Unauthorized("missing bearer token".into()))
            .into_response();
    };

    let Some(api_token) = ctx.tokens.get(token) else {
        warn!("rejected request with unknown bearer token");
        return ApiError(ContendoError::Unauthorized("unknown bearer token".into()))
            .into_response();
    };

    let session = Session {
        tenant_id: api_token.tenant_id.clone(),
        role: api_token.role,
        actor: api_token.label.clone().unwrap_or_else(|| "admin".to_string()),
    };
    request.extensions_mut().insert(session);
    next.run(request).await
}

/// Require the admin role and an enabled calendar module for the tenant.
///
/// Runs after `authenticate`. A missing module record follows the configured
/// policy rather than silently passing.
pub async fn require_calendar_module(
    State(ctx): State<Arc<AppContext>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(session) = request.extensions().get::<Session>().cloned() else {
        return ApiError(ContendoError::Unauthorized("missing session".into())).into_response();
    };

    if session.role != Role::Admin {
        return forbidden_response("admin role required");
    }

    let enabled = match ctx.module_flags.is_enabled(&session.tenant_id, CALENDAR_MODULE).await {
        Ok(flag) => flag,
        Err(e) => return ApiError(e).into_response(),
    };

    match enabled {
        Some(true) => next.run(request).await,
        Some(false) => forbidden_response("calendar module is disabled for this tenant"),
        None if ctx.config.server.gating_fail_open => {
            debug!(tenant_id = %session.tenant_id, "no module record, gating configured fail-open");
            next.run(request).await
        }
        None => forbidden_response("calendar module is not provisioned for this tenant"),
    }
}
