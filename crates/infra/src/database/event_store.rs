//! SQLite-backed implementation of the EventStore port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use contendo_core::EventStore;
use contendo_domain::{
    CalendarEvent, CalendarEventParams, ContendoError, EventKind, EventStatus, Result, UndoLog,
};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::manager::DbManager;
use crate::errors::InfraError;

const EVENT_COLUMNS: &str = "id, tenant_id, kind, title, start_ts, end_ts, all_day, status,
        employee_id, external_id, metadata, version, created_at, updated_at";

/// SQLite implementation of the EventStore port
pub struct SqliteEventStore {
    db: Arc<DbManager>,
}

impl SqliteEventStore {
    /// Create a new event store
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<CalendarEvent> {
    let kind_text: String = row.get(2)?;
    let kind = EventKind::parse(&kind_text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    let status_text: Option<String> = row.get(7)?;
    let status = match status_text {
        None => None,
        Some(text) => Some(EventStatus::parse(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e))
        })?),
    };

    let metadata_text: String = row.get(10)?;
    let metadata = serde_json::from_str(&metadata_text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

    Ok(CalendarEvent {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        kind,
        title: row.get(3)?,
        start_ts: row.get(4)?,
        end_ts: row.get(5)?,
        all_day: row.get(6)?,
        status,
        employee_id: row.get(8)?,
        external_id: row.get(9)?,
        metadata,
        version: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

#[async_trait]
impl EventStore for SqliteEventStore {
    #[instrument(skip(self, params_list), fields(count = params_list.len()))]
    async fn insert_events(
        &self,
        tenant_id: &str,
        params_list: &[CalendarEventParams],
    ) -> Result<Vec<CalendarEvent>> {
        for p in params_list {
            p.validate()?;
        }

        let now = Utc::now().timestamp();
        let mut conn = self.db.get()?;
        let tx = conn.transaction().map_err(InfraError::from)?;

        let mut created = Vec::with_capacity(params_list.len());
        for p in params_list {
            let metadata_text =
                serde_json::to_string(&p.metadata).map_err(InfraError::from)?;
            let event = CalendarEvent {
                id: Uuid::now_v7().to_string(),
                tenant_id: tenant_id.to_string(),
                kind: p.kind,
                title: p.title.clone(),
                start_ts: p.start_ts,
                end_ts: p.end_ts,
                all_day: p.all_day,
                status: p.status,
                employee_id: p.employee_id.clone(),
                external_id: p.external_id.clone(),
                metadata: p.metadata.clone(),
                version: 1,
                created_at: now,
                updated_at: now,
            };

            tx.execute(
                "INSERT INTO calendar_events (
                    id, tenant_id, kind, title, start_ts, end_ts, all_day, status,
                    employee_id, external_id, metadata, version, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    event.id,
                    event.tenant_id,
                    event.kind.as_str(),
                    event.title,
                    event.start_ts,
                    event.end_ts,
                    event.all_day,
                    event.status.map(|s| s.as_str()),
                    event.employee_id,
                    event.external_id,
                    metadata_text,
                    event.version,
                    event.created_at,
                    event.updated_at,
                ],
            )
            .map_err(InfraError::from)?;

            created.push(event);
        }

        tx.commit().map_err(InfraError::from)?;
        debug!(tenant_id, inserted = created.len(), "inserted calendar events");
        Ok(created)
    }

    async fn get_event(&self, tenant_id: &str, id: &str) -> Result<Option<CalendarEvent>> {
        let conn = self.db.get()?;
        conn.query_row(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM calendar_events WHERE id = ?1 AND tenant_id = ?2"
            ),
            params![id, tenant_id],
            map_event_row,
        )
        .optional()
        .map_err(|e| InfraError::from(e).into())
    }

    async fn find_by_external_id(
        &self,
        tenant_id: &str,
        external_id: &str,
    ) -> Result<Option<CalendarEvent>> {
        let conn = self.db.get()?;
        conn.query_row(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM calendar_events
                 WHERE tenant_id = ?1 AND external_id = ?2"
            ),
            params![tenant_id, external_id],
            map_event_row,
        )
        .optional()
        .map_err(|e| InfraError::from(e).into())
    }

    #[instrument(skip(self))]
    async fn list_events_in_range(
        &self,
        tenant_id: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<Vec<CalendarEvent>> {
        let conn = self.db.get()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM calendar_events
                 WHERE tenant_id = ?1 AND start_ts >= ?2 AND start_ts <= ?3
                 ORDER BY start_ts ASC"
            ))
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map(params![tenant_id, start_ts, end_ts], map_event_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        debug!(tenant_id, start_ts, end_ts, count = rows.len(), "listed calendar events");
        Ok(rows)
    }

    async fn list_pending_push(
        &self,
        tenant_id: &str,
        since: Option<i64>,
    ) -> Result<Vec<CalendarEvent>> {
        let conn = self.db.get()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM calendar_events
                 WHERE tenant_id = ?1
                   AND (external_id IS NULL OR (?2 IS NOT NULL AND updated_at > ?2))
                 ORDER BY start_ts ASC"
            ))
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map(params![tenant_id, since], map_event_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn update_event(&self, tenant_id: &str, event: &CalendarEvent) -> Result<CalendarEvent> {
        let metadata_text = serde_json::to_string(&event.metadata).map_err(InfraError::from)?;
        let now = Utc::now().timestamp();

        let conn = self.db.get()?;
        let changed = conn
            .execute(
                "UPDATE calendar_events
                 SET kind = ?1, title = ?2, start_ts = ?3, end_ts = ?4, all_day = ?5,
                     status = ?6, employee_id = ?7, external_id = ?8, metadata = ?9,
                     version = version + 1, updated_at = ?10
                 WHERE id = ?11 AND tenant_id = ?12",
                params![
                    event.kind.as_str(),
                    event.title,
                    event.start_ts,
                    event.end_ts,
                    event.all_day,
                    event.status.map(|s| s.as_str()),
                    event.employee_id,
                    event.external_id,
                    metadata_text,
                    now,
                    event.id,
                    tenant_id,
                ],
            )
            .map_err(InfraError::from)?;

        if changed == 0 {
            return Err(ContendoError::NotFound(format!("event not found: {}", event.id)));
        }

        self.get_event(tenant_id, &event.id)
            .await?
            .ok_or_else(|| ContendoError::NotFound(format!("event not found: {}", event.id)))
    }

    async fn delete_event(&self, tenant_id: &str, id: &str) -> Result<bool> {
        let conn = self.db.get()?;
        let deleted = conn
            .execute(
                "DELETE FROM calendar_events WHERE id = ?1 AND tenant_id = ?2",
                params![id, tenant_id],
            )
            .map_err(InfraError::from)?;
        Ok(deleted > 0)
    }

    async fn delete_by_external_id(&self, tenant_id: &str, external_id: &str) -> Result<bool> {
        let conn = self.db.get()?;
        let deleted = conn
            .execute(
                "DELETE FROM calendar_events WHERE tenant_id = ?1 AND external_id = ?2",
                params![tenant_id, external_id],
            )
            .map_err(InfraError::from)?;
        Ok(deleted > 0)
    }

    async fn mark_synced(&self, tenant_id: &str, id: &str, external_id: &str) -> Result<()> {
        let now = Utc::now().timestamp();
        let conn = self.db.get()?;
        let changed = conn
            .execute(
                "UPDATE calendar_events
                 SET external_id = ?1, version = version + 1, updated_at = ?2
                 WHERE id = ?3 AND tenant_id = ?4",
                params![external_id, now, id, tenant_id],
            )
            .map_err(InfraError::from)?;
        if changed == 0 {
            return Err(ContendoError::NotFound(format!("event not found: {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, undo))]
    async fn revert_import(&self, tenant_id: &str, undo: &UndoLog) -> Result<()> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction().map_err(InfraError::from)?;

        // Verify every stamp before mutating anything.
        for stamp in &undo.created {
            let row: Option<(String, i64)> = tx
                .query_row(
                    "SELECT tenant_id, version FROM calendar_events WHERE id = ?1",
                    params![stamp.event_id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()
                .map_err(InfraError::from)?;

            match row {
                Some((tenant, version)) if tenant == tenant_id => {
                    if version != stamp.version {
                        return Err(ContendoError::Conflict(format!(
                            "event {} was modified after the import (version {} != {})",
                            stamp.event_id, version, stamp.version
                        )));
                    }
                }
                _ => {
                    return Err(ContendoError::Conflict(format!(
                        "event {} created by the import no longer exists",
                        stamp.event_id
                    )));
                }
            }
        }

        for stamp in &undo.created {
            tx.execute(
                "DELETE FROM calendar_events WHERE id = ?1 AND tenant_id = ?2",
                params![stamp.event_id, tenant_id],
            )
            .map_err(InfraError::from)?;
        }

        for prior in undo.updated.iter().chain(undo.deleted.iter()) {
            let metadata_text = serde_json::to_string(&prior.metadata).map_err(InfraError::from)?;
            tx.execute(
                "INSERT OR REPLACE INTO calendar_events (
                    id, tenant_id, kind, title, start_ts, end_ts, all_day, status,
                    employee_id, external_id, metadata, version, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    prior.id,
                    prior.tenant_id,
                    prior.kind.as_str(),
                    prior.title,
                    prior.start_ts,
                    prior.end_ts,
                    prior.all_day,
                    prior.status.map(|s| s.as_str()),
                    prior.employee_id,
                    prior.external_id,
                    metadata_text,
                    prior.version,
                    prior.created_at,
                    prior.updated_at,
                ],
            )
            .map_err(InfraError::from)?;
        }

        tx.commit().map_err(InfraError::from)?;
        debug!(tenant_id, reverted = undo.created.len(), "reverted import batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use contendo_domain::CreatedStamp;
    use tempfile::TempDir;

    use super::*;

    fn setup() -> (SqliteEventStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let db = DbManager::new(temp.path().join("test.db"), 2).unwrap();
        (SqliteEventStore::new(Arc::new(db)), temp)
    }

    fn absence_params(title: &str, start_ts: i64) -> CalendarEventParams {
        CalendarEventParams {
            kind: EventKind::Absence,
            title: title.to_string(),
            start_ts,
            end_ts: Some(start_ts + 86_400),
            all_day: true,
            status: Some(EventStatus::Pending),
            employee_id: Some("emp-1".to_string()),
            external_id: None,
            metadata: serde_json::json!({"confidence": 0.8}),
        }
    }

    #[tokio::test]
    async fn insert_and_read_back() {
        let (store, _temp) = setup();

        let created =
            store.insert_events("t1", &[absence_params("Vacaciones", 1_700_000_000)]).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].version, 1);

        let fetched = store.get_event("t1", &created[0].id).await.unwrap().unwrap();
        assert_eq!(fetched, created[0]);

        // Tenant scoping.
        assert!(store.get_event("t2", &created[0].id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let (store, _temp) = setup();
        let created =
            store.insert_events("t1", &[absence_params("Vacaciones", 1_700_000_000)]).await.unwrap();

        let mut edited = created[0].clone();
        edited.title = "Vacaciones ampliadas".to_string();
        let updated = store.update_event("t1", &edited).await.unwrap();

        assert_eq!(updated.version, 2);
        assert_eq!(updated.title, "Vacaciones ampliadas");
    }

    #[tokio::test]
    async fn pending_push_filters_synced_events() {
        let (store, _temp) = setup();
        let created = store
            .insert_events(
                "t1",
                &[absence_params("a", 1_700_000_000), absence_params("b", 1_700_086_400)],
            )
            .await
            .unwrap();

        store.mark_synced("t1", &created[0].id, "g-1").await.unwrap();

        let pending = store.list_pending_push("t1", None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, created[1].id);

        // With a `since` in the past, the synced-but-touched event reappears.
        let pending = store.list_pending_push("t1", Some(0)).await.unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn revert_deletes_created_events() {
        let (store, _temp) = setup();
        let created = store
            .insert_events(
                "t1",
                &[absence_params("a", 1_700_000_000), absence_params("b", 1_700_086_400)],
            )
            .await
            .unwrap();

        let undo = UndoLog {
            created: created
                .iter()
                .map(|e| CreatedStamp { event_id: e.id.clone(), version: e.version })
                .collect(),
            updated: vec![],
            deleted: vec![],
        };
        store.revert_import("t1", &undo).await.unwrap();

        for event in &created {
            assert!(store.get_event("t1", &event.id).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn revert_aborts_atomically_on_stale_version() {
        let (store, _temp) = setup();
        let created = store
            .insert_events(
                "t1",
                &[absence_params("a", 1_700_000_000), absence_params("b", 1_700_086_400)],
            )
            .await
            .unwrap();

        let undo = UndoLog {
            created: created
                .iter()
                .map(|e| CreatedStamp { event_id: e.id.clone(), version: e.version })
                .collect(),
            updated: vec![],
            deleted: vec![],
        };

        // Touch the second event after the stamp was taken.
        let mut edited = created[1].clone();
        edited.title = "editado".to_string();
        store.update_event("t1", &edited).await.unwrap();

        let err = store.revert_import("t1", &undo).await.unwrap_err();
        assert!(matches!(err, ContendoError::Conflict(_)));

        // The first event was NOT deleted: the revert is all-or-nothing.
        assert!(store.get_event("t1", &created[0].id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn external_id_lookups_and_deletes() {
        let (store, _temp) = setup();
        let mut params = absence_params("externo", 1_700_000_000);
        params.external_id = Some("g-9".to_string());
        store.insert_events("t1", &[params]).await.unwrap();

        assert!(store.find_by_external_id("t1", "g-9").await.unwrap().is_some());
        assert!(store.delete_by_external_id("t1", "g-9").await.unwrap());
        assert!(!store.delete_by_external_id("t1", "g-9").await.unwrap());
    }
}
