//! Sync-specific error types
//!
//! Provides error classification for sync operations with retry metadata.

use contendo_domain::ContendoError;
use thiserror::Error;

/// Categories of sync errors for retry logic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncErrorCategory {
    /// Authentication errors (401, 403) - non-retryable, disables sync
    Authentication,
    /// Rate limiting errors (429) - retry with backoff
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx except auth) - non-retryable
    Client,
    /// Network/connection errors - retryable
    Network,
    /// Database errors - may be retryable
    Database,
    /// Configuration errors - non-retryable
    Config,
    /// Expired incremental cursor (410) - triggers one full resync
    Cursor,
}

/// Sync operation errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sync cursor invalidated by provider")]
    CursorExpired,
}

impl SyncError {
    /// Get the error category for this error
    pub fn category(&self) -> SyncErrorCategory {
        match self {
            Self::Auth(_) => SyncErrorCategory::Authentication,
            Self::RateLimit(_) => SyncErrorCategory::RateLimit,
            Self::Server(_) => SyncErrorCategory::Server,
            Self::Client(_) => SyncErrorCategory::Client,
            Self::Network(_) => SyncErrorCategory::Network,
            Self::Database(_) => SyncErrorCategory::Database,
            Self::Config(_) => SyncErrorCategory::Config,
            Self::CursorExpired => SyncErrorCategory::Cursor,
        }
    }

    /// Check if this error should be retried within a run
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            SyncErrorCategory::RateLimit
                | SyncErrorCategory::Server
                | SyncErrorCategory::Network
                | SyncErrorCategory::Database
        )
    }
}

/// Result alias for provider and engine internals
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Convert from ContendoError to SyncError
impl From<ContendoError> for SyncError {
    fn from(err: ContendoError) -> Self {
        match err {
            ContendoError::Database(message) => Self::Database(message),
            ContendoError::Config(message) => Self::Config(message),
            ContendoError::Unauthorized(message) => Self::Auth(message),
            ContendoError::Upstream(message) => Self::Server(message),
            ContendoError::NotFound(message)
            | ContendoError::Validation(message)
            | ContendoError::Conflict(message) => Self::Client(message),
            ContendoError::Internal(message) => Self::Server(message),
        }
    }
}

/// Surface a sync error to callers outside the engine
impl From<SyncError> for ContendoError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Auth(message) => {
                ContendoError::Upstream(format!("provider authentication failed: {message}"))
            }
            SyncError::Database(message) => ContendoError::Database(message),
            SyncError::Config(message) => ContendoError::Config(message),
            other => ContendoError::Upstream(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(SyncError::Auth("x".into()).category(), SyncErrorCategory::Authentication);
        assert_eq!(SyncError::RateLimit("x".into()).category(), SyncErrorCategory::RateLimit);
        assert_eq!(SyncError::CursorExpired.category(), SyncErrorCategory::Cursor);
    }

    #[test]
    fn test_should_retry() {
        assert!(SyncError::RateLimit("x".into()).should_retry());
        assert!(SyncError::Server("x".into()).should_retry());
        assert!(SyncError::Network("x".into()).should_retry());
        assert!(!SyncError::Auth("x".into()).should_retry());
        assert!(!SyncError::Client("x".into()).should_retry());
        assert!(!SyncError::CursorExpired.should_retry());
    }
}
