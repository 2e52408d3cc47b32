//! Per-tenant module enablement flags.
//!
//! The API layer gates calendar routes on these. A missing record is handled
//! by explicit policy (`gating_fail_open`), never silently.

use std::sync::Arc;

use async_trait::async_trait;
use contendo_domain::Result;
use rusqlite::{params, OptionalExtension};

use super::manager::DbManager;
use crate::errors::InfraError;

/// Lookup interface used by the API gating middleware
#[async_trait]
pub trait ModuleFlags: Send + Sync {
    /// `Some(enabled)` when a record exists, `None` when the tenant has no
    /// record for this module.
    async fn is_enabled(&self, tenant_id: &str, module: &str) -> Result<Option<bool>>;
}

/// SQLite implementation of the module flag lookup
pub struct SqliteModuleFlags {
    db: Arc<DbManager>,
}

impl SqliteModuleFlags {
    /// Create a new module flag repository
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Set a module flag for a tenant.
    pub fn set_module(&self, tenant_id: &str, module: &str, enabled: bool) -> Result<()> {
        let conn = self.db.get()?;
        conn.execute(
            "INSERT INTO tenant_modules (tenant_id, module, enabled)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(tenant_id, module) DO UPDATE SET enabled = excluded.enabled",
            params![tenant_id, module, enabled],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }
}

#[async_trait]
impl ModuleFlags for SqliteModuleFlags {
    async fn is_enabled(&self, tenant_id: &str, module: &str) -> Result<Option<bool>> {
        let conn = self.db.get()?;
        conn.query_row(
            "SELECT enabled FROM tenant_modules WHERE tenant_id = ?1 AND module = ?2",
            params![tenant_id, module],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| InfraError::from(e).into())
    }
}
