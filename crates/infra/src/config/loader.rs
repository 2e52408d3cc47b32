//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `CONTENDO_DB_PATH`: Database file path
//! - `CONTENDO_DB_POOL_SIZE`: Connection pool size
//! - `CONTENDO_BIND_ADDR`: HTTP listen address (host:port)
//! - `CONTENDO_GATING_FAIL_OPEN`: Module gating policy on missing records
//! - `CONTENDO_SYNC_MAX_ATTEMPTS`: Provider retry bound per sync run
//! - `CONTENDO_OCR_LANG`: Tesseract language
//! - `CONTENDO_GOOGLE_CLIENT_ID` / `CONTENDO_GOOGLE_CLIENT_SECRET`
//! - `CONTENDO_GOOGLE_CALENDAR_ID`: Calendar to reconcile (default primary)
//! - `CONTENDO_WEBHOOK_CALLBACK_URL`: Public address for push notifications
//! - `CONTENDO_API_TOKENS`: JSON array of `{token, tenant_id, role}`
//!
//! ## File Locations
//! The loader probes `config.{json,toml}` and `contendo.{json,toml}` in the
//! working directory, then the parent and grandparent directories.

use std::path::{Path, PathBuf};

use contendo_domain::{
    AuthConfig, Config, ContendoError, DatabaseConfig, GoogleConfig, OcrConfig, Result,
    ServerConfig, SyncConfig,
};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `ContendoError::Config` if configuration cannot be loaded from
/// either source.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "environment configuration incomplete, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `ContendoError::Config` if required variables are missing or have
/// invalid values.
pub fn load_from_env() -> Result<Config> {
    let db_path = env_var("CONTENDO_DB_PATH")?;
    let db_pool_size = env_var("CONTENDO_DB_POOL_SIZE").and_then(|s| {
        s.parse::<u32>().map_err(|e| ContendoError::Config(format!("invalid pool size: {e}")))
    })?;

    let bind_addr = env_var("CONTENDO_BIND_ADDR")?;
    let gating_fail_open = env_bool("CONTENDO_GATING_FAIL_OPEN", false);

    let mut sync = SyncConfig::default();
    if let Ok(value) = std::env::var("CONTENDO_SYNC_MAX_ATTEMPTS") {
        sync.max_attempts = value
            .parse::<u32>()
            .map_err(|e| ContendoError::Config(format!("invalid sync max attempts: {e}")))?;
    }

    let mut ocr = OcrConfig::default();
    if let Ok(lang) = std::env::var("CONTENDO_OCR_LANG") {
        ocr.tesseract_lang = lang;
    }

    let google = GoogleConfig {
        client_id: env_var("CONTENDO_GOOGLE_CLIENT_ID")?,
        client_secret: env_var("CONTENDO_GOOGLE_CLIENT_SECRET")?,
        calendar_id: std::env::var("CONTENDO_GOOGLE_CALENDAR_ID")
            .unwrap_or_else(|_| "primary".to_string()),
        webhook_callback_url: env_var("CONTENDO_WEBHOOK_CALLBACK_URL")?,
    };

    let auth = match std::env::var("CONTENDO_API_TOKENS") {
        Ok(json) => serde_json::from_str::<AuthConfig>(&format!("{{\"tokens\":{json}}}"))
            .map_err(|e| ContendoError::Config(format!("invalid CONTENDO_API_TOKENS: {e}")))?,
        Err(_) => AuthConfig::default(),
    };

    Ok(Config {
        database: DatabaseConfig { path: db_path, pool_size: db_pool_size },
        server: ServerConfig { bind_addr, gating_fail_open },
        sync,
        ocr,
        google,
        auth,
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files. Supports
/// JSON and TOML formats, detected by file extension.
///
/// # Errors
/// Returns `ContendoError::Config` if no config file is found or the file
/// does not parse.
pub fn load_from_file(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ContendoError::Config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            p.to_path_buf()
        }
        None => probe_config_paths().ok_or_else(|| {
            ContendoError::Config("no config file found in probed locations".into())
        })?,
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| ContendoError::Config(format!("failed to read {}: {e}", path.display())))?;

    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .map_err(|e| ContendoError::Config(format!("invalid JSON config: {e}")))?,
        Some("toml") => toml::from_str(&content)
            .map_err(|e| ContendoError::Config(format!("invalid TOML config: {e}")))?,
        other => {
            return Err(ContendoError::Config(format!(
                "unsupported config extension: {other:?}"
            )))
        }
    };

    tracing::info!(path = %path.display(), "configuration loaded from file");
    Ok(config)
}

/// Probe the conventional config file locations, nearest first.
fn probe_config_paths() -> Option<PathBuf> {
    let names = ["config.json", "config.toml", "contendo.json", "contendo.toml"];
    let bases = [PathBuf::from("."), PathBuf::from(".."), PathBuf::from("../..")];

    for base in &bases {
        for name in &names {
            let candidate = base.join(name);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }
    None
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| ContendoError::Config(format!("missing environment variable: {name}")))
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}
