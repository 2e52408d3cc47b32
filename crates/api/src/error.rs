//! Error to HTTP response mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use contendo_domain::{ContendoError, ItemError};

/// Wrapper turning domain errors into HTTP responses
#[derive(Debug)]
pub struct ApiError(pub ContendoError);

impl From<ContendoError> for ApiError {
    fn from(value: ContendoError) -> Self {
        ApiError(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ContendoError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ContendoError::NotFound(_) => StatusCode::NOT_FOUND,
            ContendoError::Conflict(_) => StatusCode::CONFLICT,
            ContendoError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ContendoError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ContendoError::Database(_) | ContendoError::Config(_) | ContendoError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "code": self.0.code(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// 422 response for a confirm rejected by per-item validation.
pub fn rejected_items_response(errors: &[ItemError]) -> Response {
    let body = serde_json::json!({
        "code": "validation",
        "message": "one or more items failed validation",
        "details": errors,
    });
    (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
}

/// 403 response used by the role and module gates.
pub fn forbidden_response(message: &str) -> Response {
    let body = serde_json::json!({ "code": "forbidden", "message": message });
    (StatusCode::FORBIDDEN, Json(body)).into_response()
}
