//! Domain constants and limits

/// Maximum number of files accepted by a single OCR preview upload.
pub const MAX_IMPORT_FILES: usize = 12;

/// Maximum size of a single uploaded file in bytes (10 MB).
pub const MAX_IMPORT_FILE_BYTES: usize = 10 * 1024 * 1024;

/// MIME types accepted by the OCR preview upload.
pub const SUPPORTED_IMPORT_MIME: [&str; 7] = [
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/tiff",
    "image/gif",
    "image/bmp",
    "text/plain",
];

/// Default bound on provider retry attempts within one sync run.
pub const DEFAULT_SYNC_MAX_ATTEMPTS: u32 = 3;

/// Default window when no incremental sync cursor is available.
pub const DEFAULT_SYNC_LOOKBACK_DAYS: i64 = 30;
pub const DEFAULT_SYNC_LOOKAHEAD_DAYS: i64 = 90;

/// Lifetime requested for provider webhook channels (7 days).
pub const WEBHOOK_CHANNEL_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Module key gated on the admin calendar routes.
pub const CALENDAR_MODULE: &str = "calendar";

/// Number of sync runs returned by the history endpoint.
pub const SYNC_HISTORY_LIMIT: usize = 50;
