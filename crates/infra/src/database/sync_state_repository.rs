//! SQLite-backed implementation of the SyncStateRepository port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use contendo_core::SyncStateRepository;
use contendo_domain::{Result, SyncState, WebhookChannel};
use rusqlite::{params, OptionalExtension, Row};
use tracing::instrument;

use super::manager::DbManager;
use crate::errors::InfraError;

const STATE_COLUMNS: &str = "tenant_id, connected, enabled, last_sync, sync_token, refresh_token,
        channel_id, channel_resource_id, channel_token, channel_expiry, updated_at";

/// SQLite implementation of the SyncStateRepository port
pub struct SqliteSyncStateRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncStateRepository {
    /// Create a new sync state repository
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Store the provider refresh credential and mark the tenant connected.
    /// Called from the (externally supplied) authorization flow.
    pub fn set_connected(&self, tenant_id: &str, refresh_token: &str) -> Result<()> {
        let now = Utc::now().timestamp();
        let conn = self.db.get()?;
        self.ensure_row(&conn, tenant_id, now)?;
        conn.execute(
            "UPDATE sync_state
             SET connected = 1, enabled = 1, refresh_token = ?1, updated_at = ?2
             WHERE tenant_id = ?3",
            params![refresh_token, now, tenant_id],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    fn ensure_row(
        &self,
        conn: &rusqlite::Connection,
        tenant_id: &str,
        now: i64,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO sync_state (tenant_id, connected, enabled, updated_at)
             VALUES (?1, 0, 0, ?2)
             ON CONFLICT(tenant_id) DO NOTHING",
            params![tenant_id, now],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    fn update(&self, tenant_id: &str, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<()> {
        let now = Utc::now().timestamp();
        let conn = self.db.get()?;
        self.ensure_row(&conn, tenant_id, now)?;
        conn.execute(sql, args).map_err(InfraError::from)?;
        Ok(())
    }
}

fn map_state_row(row: &Row<'_>) -> rusqlite::Result<SyncState> {
    let channel_id: Option<String> = row.get(6)?;
    let channel = match channel_id {
        Some(id) => Some(WebhookChannel {
            id,
            resource_id: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            token: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            expiry: row.get::<_, Option<i64>>(9)?.unwrap_or_default(),
        }),
        None => None,
    };

    Ok(SyncState {
        tenant_id: row.get(0)?,
        connected: row.get(1)?,
        enabled: row.get(2)?,
        last_sync: row.get(3)?,
        sync_token: row.get(4)?,
        refresh_token: row.get(5)?,
        channel,
        updated_at: row.get(10)?,
    })
}

#[async_trait]
impl SyncStateRepository for SqliteSyncStateRepository {
    async fn get_or_default(&self, tenant_id: &str) -> Result<SyncState> {
        let conn = self.db.get()?;
        let stored = conn
            .query_row(
                &format!("SELECT {STATE_COLUMNS} FROM sync_state WHERE tenant_id = ?1"),
                params![tenant_id],
                map_state_row,
            )
            .optional()
            .map_err(InfraError::from)?;

        Ok(stored.unwrap_or_else(|| SyncState::disconnected(tenant_id, Utc::now().timestamp())))
    }

    async fn find_by_channel(&self, channel_id: &str) -> Result<Option<SyncState>> {
        let conn = self.db.get()?;
        conn.query_row(
            &format!("SELECT {STATE_COLUMNS} FROM sync_state WHERE channel_id = ?1"),
            params![channel_id],
            map_state_row,
        )
        .optional()
        .map_err(|e| InfraError::from(e).into())
    }

    async fn set_last_sync(&self, tenant_id: &str, ts: i64) -> Result<()> {
        let now = Utc::now().timestamp();
        self.update(
            tenant_id,
            "UPDATE sync_state SET last_sync = ?1, updated_at = ?2 WHERE tenant_id = ?3",
            &[&ts, &now, &tenant_id],
        )
    }

    async fn set_sync_token(&self, tenant_id: &str, token: Option<&str>) -> Result<()> {
        let now = Utc::now().timestamp();
        self.update(
            tenant_id,
            "UPDATE sync_state SET sync_token = ?1, updated_at = ?2 WHERE tenant_id = ?3",
            &[&token, &now, &tenant_id],
        )
    }

    #[instrument(skip(self))]
    async fn set_enabled(&self, tenant_id: &str, enabled: bool) -> Result<()> {
        let now = Utc::now().timestamp();
        self.update(
            tenant_id,
            "UPDATE sync_state SET enabled = ?1, updated_at = ?2 WHERE tenant_id = ?3",
            &[&enabled, &now, &tenant_id],
        )
    }

    async fn set_channel(&self, tenant_id: &str, channel: Option<&WebhookChannel>) -> Result<()> {
        let now = Utc::now().timestamp();
        let (id, resource_id, token, expiry) = match channel {
            Some(c) => {
                (Some(c.id.as_str()), Some(c.resource_id.as_str()), Some(c.token.as_str()), Some(c.expiry))
            }
            None => (None, None, None, None),
        };
        self.update(
            tenant_id,
            "UPDATE sync_state
             SET channel_id = ?1, channel_resource_id = ?2, channel_token = ?3,
                 channel_expiry = ?4, updated_at = ?5
             WHERE tenant_id = ?6",
            &[&id, &resource_id, &token, &expiry, &now, &tenant_id],
        )
    }
}
