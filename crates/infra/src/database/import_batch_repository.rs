//! SQLite-backed implementation of the ImportBatchRepository port.
//!
//! File descriptors, candidate items, and the undo log are stored as JSON
//! columns; the review UI round-trips them wholesale.

use std::sync::Arc;

use async_trait::async_trait;
use contendo_core::ImportBatchRepository;
use contendo_domain::{
    BatchStatus, CandidateEvent, ImportBatch, ImportBatchSummary, Result, UndoLog,
};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, instrument};

use super::manager::DbManager;
use crate::errors::InfraError;

/// SQLite implementation of the ImportBatchRepository port
pub struct SqliteImportBatchRepository {
    db: Arc<DbManager>,
}

impl SqliteImportBatchRepository {
    /// Create a new import batch repository
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

fn map_batch_row(row: &Row<'_>) -> rusqlite::Result<ImportBatch> {
    fn json_col<T: serde::de::DeserializeOwned>(
        idx: usize,
        text: &str,
    ) -> rusqlite::Result<T> {
        serde_json::from_str(text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    let files_text: String = row.get(2)?;
    let items_text: String = row.get(4)?;
    let status_text: String = row.get(5)?;
    let undo_text: Option<String> = row.get(6)?;

    let status = BatchStatus::parse(&status_text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    let undo_log: Option<UndoLog> = match undo_text {
        None => None,
        Some(text) => Some(json_col(6, &text)?),
    };

    Ok(ImportBatch {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        files: json_col(2, &files_text)?,
        raw_text: row.get(3)?,
        items: json_col(4, &items_text)?,
        status,
        undo_log,
        created_at: row.get(7)?,
        created_by: row.get(8)?,
    })
}

#[async_trait]
impl ImportBatchRepository for SqliteImportBatchRepository {
    #[instrument(skip(self, batch), fields(batch_id = %batch.id))]
    async fn create_batch(&self, batch: &ImportBatch) -> Result<()> {
        let files = serde_json::to_string(&batch.files).map_err(InfraError::from)?;
        let items = serde_json::to_string(&batch.items).map_err(InfraError::from)?;
        let undo_log = batch
            .undo_log
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(InfraError::from)?;

        let conn = self.db.get()?;
        conn.execute(
            "INSERT INTO import_batches (
                id, tenant_id, files, raw_text, items, status, undo_log, created_at, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                batch.id,
                batch.tenant_id,
                files,
                batch.raw_text,
                items,
                batch.status.as_str(),
                undo_log,
                batch.created_at,
                batch.created_by,
            ],
        )
        .map_err(InfraError::from)?;

        debug!(batch_id = %batch.id, items = batch.items.len(), "created import batch");
        Ok(())
    }

    async fn get_batch(&self, tenant_id: &str, id: &str) -> Result<Option<ImportBatch>> {
        let conn = self.db.get()?;
        conn.query_row(
            "SELECT id, tenant_id, files, raw_text, items, status, undo_log, created_at, created_by
             FROM import_batches WHERE id = ?1 AND tenant_id = ?2",
            params![id, tenant_id],
            map_batch_row,
        )
        .optional()
        .map_err(|e| InfraError::from(e).into())
    }

    async fn list_batches(&self, tenant_id: &str) -> Result<Vec<ImportBatchSummary>> {
        let conn = self.db.get()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, status, files, items, created_at, created_by
                 FROM import_batches
                 WHERE tenant_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map(params![tenant_id], |row| {
                let status_text: String = row.get(1)?;
                let status = BatchStatus::parse(&status_text).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                })?;
                let files_text: String = row.get(2)?;
                let items_text: String = row.get(3)?;
                let files: Vec<serde_json::Value> =
                    serde_json::from_str(&files_text).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
                    })?;
                let items: Vec<serde_json::Value> =
                    serde_json::from_str(&items_text).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
                    })?;

                Ok(ImportBatchSummary {
                    id: row.get(0)?,
                    status,
                    file_count: files.len(),
                    item_count: items.len(),
                    created_at: row.get(4)?,
                    created_by: row.get(5)?,
                })
            })
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        Ok(rows)
    }

    #[instrument(skip(self, items, undo_log))]
    async fn transition(
        &self,
        tenant_id: &str,
        id: &str,
        from: BatchStatus,
        to: BatchStatus,
        items: Option<&[CandidateEvent]>,
        undo_log: Option<&UndoLog>,
    ) -> Result<bool> {
        let items_text =
            items.map(serde_json::to_string).transpose().map_err(InfraError::from)?;
        let undo_text =
            undo_log.map(serde_json::to_string).transpose().map_err(InfraError::from)?;

        let conn = self.db.get()?;
        let changed = conn
            .execute(
                "UPDATE import_batches
                 SET status = ?1,
                     items = COALESCE(?2, items),
                     undo_log = COALESCE(?3, undo_log)
                 WHERE id = ?4 AND tenant_id = ?5 AND status = ?6",
                params![to.as_str(), items_text, undo_text, id, tenant_id, from.as_str()],
            )
            .map_err(InfraError::from)?;

        debug!(batch_id = id, from = from.as_str(), to = to.as_str(), applied = changed > 0, "batch transition");
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use contendo_domain::{CandidateOrigin, EventKind, Provenance};
    use tempfile::TempDir;

    use super::*;

    fn setup() -> (SqliteImportBatchRepository, TempDir) {
        let temp = TempDir::new().unwrap();
        let db = DbManager::new(temp.path().join("test.db"), 2).unwrap();
        (SqliteImportBatchRepository::new(Arc::new(db)), temp)
    }

    fn batch(id: &str, created_at: i64) -> ImportBatch {
        ImportBatch {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            files: vec![],
            raw_text: "Juan vacaciones 01/08/2025".to_string(),
            items: vec![CandidateEvent {
                kind: EventKind::Absence,
                title: "Vacaciones".to_string(),
                start: "2025-08-01".to_string(),
                end: None,
                all_day: true,
                employee_name: Some("Juan".to_string()),
                status: None,
                confidence: 0.8,
                origin: CandidateOrigin::Ocr,
                source: Provenance::default(),
            }],
            status: BatchStatus::Previewed,
            undo_log: None,
            created_at,
            created_by: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn round_trips_json_columns() {
        let (repo, _temp) = setup();
        let original = batch("b-1", 100);
        repo.create_batch(&original).await.unwrap();

        let loaded = repo.get_batch("t1", "b-1").await.unwrap().unwrap();
        assert_eq!(loaded.items, original.items);
        assert_eq!(loaded.status, BatchStatus::Previewed);
        assert!(loaded.undo_log.is_none());
    }

    #[tokio::test]
    async fn listing_is_most_recent_first() {
        let (repo, _temp) = setup();
        for (id, at) in [("b-1", 100), ("b-2", 300), ("b-3", 200)] {
            repo.create_batch(&batch(id, at)).await.unwrap();
        }

        let listing = repo.list_batches("t1").await.unwrap();
        let ids: Vec<&str> = listing.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b-2", "b-3", "b-1"]);
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let (repo, _temp) = setup();
        repo.create_batch(&batch("b-1", 100)).await.unwrap();

        let applied = repo
            .transition("t1", "b-1", BatchStatus::Previewed, BatchStatus::Confirmed, None, None)
            .await
            .unwrap();
        assert!(applied);

        // Second identical transition no longer matches `from`.
        let applied = repo
            .transition("t1", "b-1", BatchStatus::Previewed, BatchStatus::Confirmed, None, None)
            .await
            .unwrap();
        assert!(!applied);

        let loaded = repo.get_batch("t1", "b-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, BatchStatus::Confirmed);
    }

    #[tokio::test]
    async fn transition_can_persist_undo_log() {
        let (repo, _temp) = setup();
        repo.create_batch(&batch("b-1", 100)).await.unwrap();

        let undo = UndoLog {
            created: vec![contendo_domain::CreatedStamp {
                event_id: "e-1".to_string(),
                version: 1,
            }],
            updated: vec![],
            deleted: vec![],
        };
        repo.transition(
            "t1",
            "b-1",
            BatchStatus::Previewed,
            BatchStatus::Confirmed,
            None,
            Some(&undo),
        )
        .await
        .unwrap();

        let loaded = repo.get_batch("t1", "b-1").await.unwrap().unwrap();
        assert_eq!(loaded.undo_log, Some(undo));
    }
}
