//! Conversions from external infrastructure errors into domain errors.

use contendo_domain::ContendoError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ContendoError);

impl From<InfraError> for ContendoError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ContendoError> for InfraError {
    fn from(value: ContendoError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → ContendoError */
/* -------------------------------------------------------------------------- */

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        let mapped = match value {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => ContendoError::Database("database is busy".into()),
                    ErrorCode::DatabaseLocked => {
                        ContendoError::Database("database is locked".into())
                    }
                    ErrorCode::ConstraintViolation => {
                        ContendoError::Conflict(format!("constraint violation: {message}"))
                    }
                    _ => ContendoError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => ContendoError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                ContendoError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                ContendoError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => ContendoError::Database("invalid UTF-8 returned from sqlite".into()),
            other => ContendoError::Database(other.to_string()),
        };
        InfraError(mapped)
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → ContendoError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(ContendoError::Database(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ContendoError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        let mapped = if value.is_timeout() || value.is_connect() {
            ContendoError::Upstream(format!("provider unreachable: {value}"))
        } else if value.is_decode() {
            ContendoError::Upstream(format!("provider response malformed: {value}"))
        } else {
            ContendoError::Upstream(value.to_string())
        };
        InfraError(mapped)
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → ContendoError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(ContendoError::Database(format!("stored JSON is invalid: {value}")))
    }
}
