//! Application configuration structures
//!
//! Populated by `contendo-infra::config::loader` from environment variables
//! or a probed config file. Defaults are production-safe: gating fails
//! closed, sync retries are bounded.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_SYNC_LOOKAHEAD_DAYS, DEFAULT_SYNC_LOOKBACK_DAYS, DEFAULT_SYNC_MAX_ATTEMPTS,
};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub ocr: OcrConfig,
    pub google: GoogleConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Policy when a tenant has no module-enablement record: `true` lets the
    /// request through, `false` rejects it. Spelled out in configuration so
    /// the failure path is a deliberate choice, and covered by tests.
    #[serde(default)]
    pub gating_fail_open: bool,
}

/// Sync engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_SYNC_MAX_ATTEMPTS,
            lookback_days: DEFAULT_SYNC_LOOKBACK_DAYS,
            lookahead_days: DEFAULT_SYNC_LOOKAHEAD_DAYS,
        }
    }
}

/// OCR extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_ocr_lang")]
    pub tesseract_lang: String,
    /// Minimum non-whitespace characters per page before OCR output is
    /// preferred over direct text extraction.
    #[serde(default = "default_min_chars")]
    pub min_chars_per_page: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self { tesseract_lang: default_ocr_lang(), min_chars_per_page: default_min_chars() }
    }
}

/// Google Calendar API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    /// Public HTTPS address the provider pushes webhook notifications to.
    pub webhook_callback_url: String,
}

/// Static API token table: token -> (tenant, role)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<ApiToken>,
}

/// A single bearer token granting a role within a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToken {
    pub token: String,
    pub tenant_id: String,
    pub role: Role,
    /// Audit label recorded as `created_by` on work done with this token.
    #[serde(default)]
    pub label: Option<String>,
}

/// Roles recognised by the API layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Employee,
}

fn default_max_attempts() -> u32 {
    DEFAULT_SYNC_MAX_ATTEMPTS
}

fn default_lookback_days() -> i64 {
    DEFAULT_SYNC_LOOKBACK_DAYS
}

fn default_lookahead_days() -> i64 {
    DEFAULT_SYNC_LOOKAHEAD_DAYS
}

fn default_ocr_lang() -> String {
    "spa".to_string()
}

fn default_min_chars() -> usize {
    100
}

fn default_calendar_id() -> String {
    "primary".to_string()
}
