//! Sync engine types
//!
//! `SyncRun` is the append-only history of reconciliations against the
//! external calendar provider; `SyncState` is the per-tenant singleton the
//! engine and the webhook receiver share.

use serde::{Deserialize, Serialize};

use crate::errors::{ContendoError, Result};

/// Direction of a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncDirection {
    ToExternal,
    FromExternal,
    Bidirectional,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToExternal => "to-external",
            Self::FromExternal => "from-external",
            Self::Bidirectional => "bidirectional",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "to-external" => Ok(Self::ToExternal),
            "from-external" => Ok(Self::FromExternal),
            "bidirectional" => Ok(Self::Bidirectional),
            other => Err(ContendoError::Validation(format!("unknown sync direction: {other}"))),
        }
    }
}

/// Terminal outcome of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Success,
    Partial,
    Failed,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            other => Err(ContendoError::Validation(format!("unknown sync outcome: {other}"))),
        }
    }
}

/// Per-run event accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
    pub skipped: u32,
    pub conflicted: u32,
    pub failed: u32,
}

/// One event the run could not reconcile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub event_id: Option<String>,
    pub external_id: Option<String>,
    pub message: String,
}

/// Append-only record of one reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: String,
    pub tenant_id: String,
    pub direction: SyncDirection,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub outcome: Option<SyncOutcome>,
    pub counts: SyncCounts,
    pub failures: Vec<ItemFailure>,
}

impl SyncRun {
    /// A run without a finish timestamp is still executing.
    pub fn is_running(&self) -> bool {
        self.finished_at.is_none()
    }
}

/// Provider webhook channel registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookChannel {
    pub id: String,
    pub resource_id: String,
    /// Shared secret echoed back by the provider on each notification.
    pub token: String,
    pub expiry: i64,
}

/// Singleton-per-tenant sync state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub tenant_id: String,
    pub connected: bool,
    pub enabled: bool,
    pub last_sync: Option<i64>,
    /// Incremental pull cursor from the provider.
    pub sync_token: Option<String>,
    /// Provider refresh credential. Never serialized into API responses.
    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,
    pub channel: Option<WebhookChannel>,
    pub updated_at: i64,
}

impl SyncState {
    /// Disconnected default for tenants that never configured sync.
    pub fn disconnected(tenant_id: &str, now: i64) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            connected: false,
            enabled: false,
            last_sync: None,
            sync_token: None,
            refresh_token: None,
            channel: None,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_and_outcome_round_trip() {
        for d in [SyncDirection::ToExternal, SyncDirection::FromExternal, SyncDirection::Bidirectional]
        {
            assert_eq!(SyncDirection::parse(d.as_str()).unwrap(), d);
        }
        for o in [SyncOutcome::Success, SyncOutcome::Partial, SyncOutcome::Failed] {
            assert_eq!(SyncOutcome::parse(o.as_str()).unwrap(), o);
        }
    }

    #[test]
    fn run_without_finish_is_running() {
        let run = SyncRun {
            id: "r1".into(),
            tenant_id: "t1".into(),
            direction: SyncDirection::FromExternal,
            started_at: 100,
            finished_at: None,
            outcome: None,
            counts: SyncCounts::default(),
            failures: vec![],
        };
        assert!(run.is_running());
    }
}
