//! Port interfaces for import operations

use async_trait::async_trait;
use contendo_domain::{
    BatchStatus, CalendarEvent, CalendarEventParams, CandidateEvent, Employee, ImportBatch,
    ImportBatchSummary, Result, UndoLog, UploadedFile,
};

/// Raw text extracted from one uploaded file
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub text: String,
    pub page_count: u32,
}

/// Trait for turning uploaded files into raw text
#[async_trait]
pub trait OcrExtractor: Send + Sync {
    /// Extract text from a single uploaded file.
    async fn extract(&self, file: &UploadedFile) -> Result<ExtractedDocument>;
}

/// Trait for the durable calendar event store
///
/// Multi-event operations (`insert_events`, `revert_import`) are transactional
/// at the adapter level: they either apply completely or not at all.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert all events in one transaction; returns the created rows.
    async fn insert_events(
        &self,
        tenant_id: &str,
        params: &[CalendarEventParams],
    ) -> Result<Vec<CalendarEvent>>;

    /// Fetch a single event by id.
    async fn get_event(&self, tenant_id: &str, id: &str) -> Result<Option<CalendarEvent>>;

    /// Fetch an event by its provider-side id.
    async fn find_by_external_id(
        &self,
        tenant_id: &str,
        external_id: &str,
    ) -> Result<Option<CalendarEvent>>;

    /// Events overlapping the given window, ordered by start.
    async fn list_events_in_range(
        &self,
        tenant_id: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<Vec<CalendarEvent>>;

    /// Events that never reached the provider, or changed since `since`.
    async fn list_pending_push(
        &self,
        tenant_id: &str,
        since: Option<i64>,
    ) -> Result<Vec<CalendarEvent>>;

    /// Overwrite an event row; bumps `version` and `updated_at`.
    async fn update_event(&self, tenant_id: &str, event: &CalendarEvent) -> Result<CalendarEvent>;

    /// Delete an event; returns whether a row existed.
    async fn delete_event(&self, tenant_id: &str, id: &str) -> Result<bool>;

    /// Delete an event by provider-side id; returns whether a row existed.
    async fn delete_by_external_id(&self, tenant_id: &str, external_id: &str) -> Result<bool>;

    /// Record the provider-side id after a successful push.
    async fn mark_synced(&self, tenant_id: &str, id: &str, external_id: &str) -> Result<()>;

    /// Replay an undo log in one transaction. Every version stamp in the log
    /// must still match the stored row; any mismatch aborts the whole replay
    /// with `Conflict` and zero mutations.
    async fn revert_import(&self, tenant_id: &str, undo: &UndoLog) -> Result<()>;
}

/// Trait for import batch persistence
#[async_trait]
pub trait ImportBatchRepository: Send + Sync {
    async fn create_batch(&self, batch: &ImportBatch) -> Result<()>;

    async fn get_batch(&self, tenant_id: &str, id: &str) -> Result<Option<ImportBatch>>;

    /// Batch summaries, most recent first.
    async fn list_batches(&self, tenant_id: &str) -> Result<Vec<ImportBatchSummary>>;

    /// Compare-and-set status transition, optionally persisting the reviewed
    /// items and the undo log in the same write. Returns `false` when the
    /// stored status no longer matches `from`.
    async fn transition(
        &self,
        tenant_id: &str,
        id: &str,
        from: BatchStatus,
        to: BatchStatus,
        items: Option<&[CandidateEvent]>,
        undo_log: Option<&UndoLog>,
    ) -> Result<bool>;
}

/// Trait for resolving schedule names to employee records
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    /// Case-insensitive lookup by display name, `None` when unknown.
    async fn resolve_name(&self, tenant_id: &str, name: &str) -> Result<Option<Employee>>;
}
