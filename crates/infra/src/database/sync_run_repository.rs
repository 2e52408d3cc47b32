//! SQLite-backed implementation of the SyncRunRepository port.
//!
//! The single-running-run guarantee is a partial unique index on
//! `sync_runs(tenant_id) WHERE finished_at IS NULL`; a second insert while a
//! run is open violates it and surfaces as `Conflict`.

use std::sync::Arc;

use async_trait::async_trait;
use contendo_core::SyncRunRepository;
use contendo_domain::{
    ContendoError, ItemFailure, Result, SyncCounts, SyncDirection, SyncOutcome, SyncRun,
};
use rusqlite::types::Type;
use rusqlite::{params, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::manager::DbManager;
use crate::errors::InfraError;

/// SQLite implementation of the SyncRunRepository port
pub struct SqliteSyncRunRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncRunRepository {
    /// Create a new sync run repository
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

fn map_run_row(row: &Row<'_>) -> rusqlite::Result<SyncRun> {
    let direction_text: String = row.get(2)?;
    let direction = SyncDirection::parse(&direction_text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    let outcome_text: Option<String> = row.get(5)?;
    let outcome = match outcome_text {
        None => None,
        Some(text) => Some(SyncOutcome::parse(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
        })?),
    };

    let failures_text: String = row.get(12)?;
    let failures: Vec<ItemFailure> = serde_json::from_str(&failures_text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, Type::Text, Box::new(e)))?;

    Ok(SyncRun {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        direction,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        outcome,
        counts: SyncCounts {
            created: row.get(6)?,
            updated: row.get(7)?,
            deleted: row.get(8)?,
            skipped: row.get(9)?,
            conflicted: row.get(10)?,
            failed: row.get(11)?,
        },
        failures,
    })
}

#[async_trait]
impl SyncRunRepository for SqliteSyncRunRepository {
    #[instrument(skip(self), fields(direction = direction.as_str()))]
    async fn start_run(
        &self,
        tenant_id: &str,
        direction: SyncDirection,
        started_at: i64,
    ) -> Result<SyncRun> {
        let run = SyncRun {
            id: Uuid::now_v7().to_string(),
            tenant_id: tenant_id.to_string(),
            direction,
            started_at,
            finished_at: None,
            outcome: None,
            counts: SyncCounts::default(),
            failures: vec![],
        };

        let conn = self.db.get()?;
        let inserted = conn.execute(
            "INSERT INTO sync_runs (id, tenant_id, direction, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run.id, run.tenant_id, direction.as_str(), started_at],
        );

        match inserted {
            Ok(_) => {
                debug!(tenant_id, run_id = %run.id, "sync run row created");
                Ok(run)
            }
            Err(e) => {
                let mapped: ContendoError = InfraError::from(e).into();
                if matches!(mapped, ContendoError::Conflict(_)) {
                    Err(ContendoError::Conflict(
                        "a sync run is already running for this tenant".into(),
                    ))
                } else {
                    Err(mapped)
                }
            }
        }
    }

    async fn finish_run(
        &self,
        tenant_id: &str,
        run_id: &str,
        outcome: SyncOutcome,
        counts: &SyncCounts,
        failures: &[ItemFailure],
        finished_at: i64,
    ) -> Result<()> {
        let failures_text = serde_json::to_string(failures).map_err(InfraError::from)?;

        let conn = self.db.get()?;
        let changed = conn
            .execute(
                "UPDATE sync_runs
                 SET finished_at = ?1, outcome = ?2,
                     created_count = ?3, updated_count = ?4, deleted_count = ?5,
                     skipped_count = ?6, conflicted_count = ?7, failed_count = ?8,
                     failures = ?9
                 WHERE id = ?10 AND tenant_id = ?11",
                params![
                    finished_at,
                    outcome.as_str(),
                    counts.created,
                    counts.updated,
                    counts.deleted,
                    counts.skipped,
                    counts.conflicted,
                    counts.failed,
                    failures_text,
                    run_id,
                    tenant_id,
                ],
            )
            .map_err(InfraError::from)?;

        if changed == 0 {
            return Err(ContendoError::NotFound(format!("sync run not found: {run_id}")));
        }
        Ok(())
    }

    async fn history(&self, tenant_id: &str, limit: usize) -> Result<Vec<SyncRun>> {
        let conn = self.db.get()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, tenant_id, direction, started_at, finished_at, outcome,
                        created_count, updated_count, deleted_count, skipped_count,
                        conflicted_count, failed_count, failures
                 FROM sync_runs
                 WHERE tenant_id = ?1
                 ORDER BY started_at DESC, id DESC
                 LIMIT ?2",
            )
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map(params![tenant_id, limit as i64], map_run_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn setup() -> (SqliteSyncRunRepository, TempDir) {
        let temp = TempDir::new().unwrap();
        let db = DbManager::new(temp.path().join("test.db"), 2).unwrap();
        (SqliteSyncRunRepository::new(Arc::new(db)), temp)
    }

    #[tokio::test]
    async fn only_one_running_run_per_tenant() {
        let (repo, _temp) = setup();

        let run = repo.start_run("t1", SyncDirection::FromExternal, 100).await.unwrap();
        let err = repo.start_run("t1", SyncDirection::ToExternal, 101).await.unwrap_err();
        assert!(matches!(err, ContendoError::Conflict(_)));

        // Another tenant is unaffected.
        repo.start_run("t2", SyncDirection::FromExternal, 102).await.unwrap();

        // Finishing the run frees the slot.
        repo.finish_run("t1", &run.id, SyncOutcome::Success, &SyncCounts::default(), &[], 200)
            .await
            .unwrap();
        repo.start_run("t1", SyncDirection::ToExternal, 201).await.unwrap();
    }

    #[tokio::test]
    async fn finish_round_trips_counts_and_failures() {
        let (repo, _temp) = setup();
        let run = repo.start_run("t1", SyncDirection::Bidirectional, 100).await.unwrap();

        let counts = SyncCounts { created: 2, updated: 1, conflicted: 1, ..SyncCounts::default() };
        let failures = vec![ItemFailure {
            event_id: Some("e-1".to_string()),
            external_id: None,
            message: "HTTP 503".to_string(),
        }];
        repo.finish_run("t1", &run.id, SyncOutcome::Partial, &counts, &failures, 200)
            .await
            .unwrap();

        let history = repo.history("t1", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, Some(SyncOutcome::Partial));
        assert_eq!(history[0].counts, counts);
        assert_eq!(history[0].failures, failures);
    }

    #[tokio::test]
    async fn history_is_most_recent_first_and_limited() {
        let (repo, _temp) = setup();
        for at in [100, 300, 200] {
            let run = repo.start_run("t1", SyncDirection::FromExternal, at).await.unwrap();
            repo.finish_run("t1", &run.id, SyncOutcome::Success, &SyncCounts::default(), &[], at + 1)
                .await
                .unwrap();
        }

        let history = repo.history("t1", 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].started_at, 300);
        assert_eq!(history[1].started_at, 200);
    }
}
