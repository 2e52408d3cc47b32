//! Import session service - core business logic

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use contendo_domain::constants::{MAX_IMPORT_FILES, MAX_IMPORT_FILE_BYTES, SUPPORTED_IMPORT_MIME};
use contendo_domain::utils::schedule_parser::{parse_schedule_text, ParsedSchedule};
use contendo_domain::{
    BatchComparison, BatchStatus, CalendarEventParams, CandidateEvent, ContendoError, CreatedStamp,
    ImportBatch, ImportBatchSummary, ItemError, Result, UndoLog, UploadedFile,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::diff::{diff_candidates, event_to_candidate};
use super::ports::{EmployeeDirectory, EventStore, ImportBatchRepository, OcrExtractor};

/// Result of a confirm attempt
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    /// All items validated; events written, batch confirmed.
    Committed(ImportBatch),
    /// At least one item failed validation; nothing was written.
    Rejected(Vec<ItemError>),
}

/// Import session service
pub struct ImportService {
    batches: Arc<dyn ImportBatchRepository>,
    events: Arc<dyn EventStore>,
    extractor: Arc<dyn OcrExtractor>,
    employees: Arc<dyn EmployeeDirectory>,
}

impl ImportService {
    /// Create a new import service
    pub fn new(
        batches: Arc<dyn ImportBatchRepository>,
        events: Arc<dyn EventStore>,
        extractor: Arc<dyn OcrExtractor>,
        employees: Arc<dyn EmployeeDirectory>,
    ) -> Self {
        Self { batches, events, extractor, employees }
    }

    /// Batch summaries, most recent first. No side effects.
    pub async fn list_batches(&self, tenant_id: &str) -> Result<Vec<ImportBatchSummary>> {
        self.batches.list_batches(tenant_id).await
    }

    /// Full batch detail, including candidate events.
    pub async fn get_batch(&self, tenant_id: &str, id: &str) -> Result<ImportBatch> {
        self.batches
            .get_batch(tenant_id, id)
            .await?
            .ok_or_else(|| ContendoError::NotFound(format!("import batch not found: {id}")))
    }

    /// Structural diff between two batches, or between a batch and the
    /// current Event Store when `b` is absent.
    #[instrument(skip(self))]
    pub async fn compare(
        &self,
        tenant_id: &str,
        a: Option<&str>,
        b: Option<&str>,
    ) -> Result<BatchComparison> {
        let Some(a) = a else {
            return Err(ContendoError::Validation("nothing to compare: no batch ids given".into()));
        };
        let batch_a = self.get_batch(tenant_id, a).await?;

        match b {
            Some(b) => {
                let batch_b = self.get_batch(tenant_id, b).await?;
                Ok(diff_candidates(&batch_a.items, &batch_b.items))
            }
            None => {
                let stored = self.store_window_candidates(tenant_id, &batch_a.items).await?;
                Ok(diff_candidates(&stored, &batch_a.items))
            }
        }
    }

    /// Run OCR extraction over the uploaded files and persist a batch in
    /// `previewed` status. Never touches the Event Store.
    #[instrument(skip(self, files), fields(file_count = files.len()))]
    pub async fn preview(
        &self,
        tenant_id: &str,
        created_by: &str,
        files: Vec<UploadedFile>,
    ) -> Result<ImportBatch> {
        validate_upload(&files)?;

        let mut raw_text = String::new();
        for (index, file) in files.iter().enumerate() {
            let extracted = self.extractor.extract(file).await?;
            raw_text.push_str(&format!("=== archivo {}: {} ===\n", index + 1, file.name));
            raw_text.push_str(&extracted.text);
            if !raw_text.ends_with('\n') {
                raw_text.push('\n');
            }
        }

        let parsed = parse_schedule_text(&raw_text);
        info!(
            tenant_id,
            candidates = parsed.candidates.len(),
            skipped = parsed.skipped_lines,
            "parsed schedule preview"
        );

        let batch = ImportBatch {
            id: Uuid::now_v7().to_string(),
            tenant_id: tenant_id.to_string(),
            files: files.iter().map(UploadedFile::descriptor).collect(),
            raw_text,
            items: parsed.candidates,
            status: BatchStatus::Previewed,
            undo_log: None,
            created_at: chrono::Utc::now().timestamp(),
            created_by: created_by.to_string(),
        };

        self.batches.create_batch(&batch).await?;
        Ok(batch)
    }

    /// Re-run only the parsing stage over admin-edited raw text. Pure: no
    /// persistence, identical input yields identical output.
    pub fn reparse(raw_text: &str) -> ParsedSchedule {
        parse_schedule_text(raw_text)
    }

    /// Validate the reviewed items and commit them as calendar events.
    ///
    /// Any validation failure rejects the whole confirm with per-item errors
    /// and zero writes. On success the batch stores the reviewed items and
    /// the undo log, and transitions to `confirmed`.
    #[instrument(skip(self, items, raw_text), fields(item_count = items.len()))]
    pub async fn confirm(
        &self,
        tenant_id: &str,
        batch_id: &str,
        items: Vec<CandidateEvent>,
        raw_text: Option<String>,
    ) -> Result<ConfirmOutcome> {
        let batch = self.get_batch(tenant_id, batch_id).await?;
        if batch.status != BatchStatus::Previewed {
            return Err(ContendoError::Conflict(format!(
                "batch {batch_id} is {}, only a previewed batch can be confirmed",
                batch.status.as_str()
            )));
        }
        if items.is_empty() {
            return Err(ContendoError::Validation("confirm requires at least one item".into()));
        }

        let _ = raw_text; // retained by the caller for audit; items are canonical

        let mut params = Vec::with_capacity(items.len());
        let mut errors = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match self.validate_item(tenant_id, item).await {
                Ok(p) => params.push(p),
                Err(message) => errors.push(ItemError { index, message }),
            }
        }
        if !errors.is_empty() {
            return Ok(ConfirmOutcome::Rejected(errors));
        }

        let created = self.events.insert_events(tenant_id, &params).await?;
        let undo_log = UndoLog {
            created: created
                .iter()
                .map(|e| CreatedStamp { event_id: e.id.clone(), version: e.version })
                .collect(),
            updated: vec![],
            deleted: vec![],
        };

        let transitioned = self
            .batches
            .transition(
                tenant_id,
                batch_id,
                BatchStatus::Previewed,
                BatchStatus::Confirmed,
                Some(&items),
                Some(&undo_log),
            )
            .await?;
        if !transitioned {
            // A concurrent confirm won the race: take our writes back out.
            warn!(batch_id, "confirm lost status race, reverting inserted events");
            self.events.revert_import(tenant_id, &undo_log).await?;
            return Err(ContendoError::Conflict(format!(
                "batch {batch_id} was confirmed concurrently"
            )));
        }

        info!(tenant_id, batch_id, events = created.len(), "import batch confirmed");
        let batch = self.get_batch(tenant_id, batch_id).await?;
        Ok(ConfirmOutcome::Committed(batch))
    }

    /// Reverse the Event Store mutations of a previously confirmed batch.
    ///
    /// The whole undo is atomic: if any affected event was modified since
    /// confirm (version mismatch) nothing is reverted and `Conflict` is
    /// returned.
    #[instrument(skip(self))]
    pub async fn undo(&self, tenant_id: &str, batch_id: &str) -> Result<ImportBatch> {
        let batch = self.get_batch(tenant_id, batch_id).await?;
        if batch.status != BatchStatus::Confirmed {
            return Err(ContendoError::Conflict(format!(
                "batch {batch_id} is {}, only a confirmed batch can be undone",
                batch.status.as_str()
            )));
        }

        if let Some(undo_log) = batch.undo_log.as_ref().filter(|log| !log.is_empty()) {
            self.events.revert_import(tenant_id, undo_log).await?;
        }

        let transitioned = self
            .batches
            .transition(
                tenant_id,
                batch_id,
                BatchStatus::Confirmed,
                BatchStatus::Undone,
                None,
                None,
            )
            .await?;
        if !transitioned {
            return Err(ContendoError::Conflict(format!(
                "batch {batch_id} changed status during undo"
            )));
        }

        info!(tenant_id, batch_id, "import batch undone");
        self.get_batch(tenant_id, batch_id).await
    }

    /// Validate one candidate item and build its insert parameters.
    async fn validate_item(
        &self,
        tenant_id: &str,
        item: &CandidateEvent,
    ) -> std::result::Result<CalendarEventParams, String> {
        let start_ts = parse_moment(&item.start)
            .ok_or_else(|| format!("start date '{}' is not a valid date", item.start))?;

        let end_ts = match item.end.as_deref() {
            None => None,
            Some(end) => Some(
                parse_moment(end).ok_or_else(|| format!("end date '{end}' is not a valid date"))?,
            ),
        };
        if let Some(end) = end_ts {
            if end < start_ts {
                return Err(format!("'{}' ends before it starts", item.title));
            }
        }

        let employee_id = match item.employee_name.as_deref() {
            None => None,
            Some(name) => {
                let employee = self
                    .employees
                    .resolve_name(tenant_id, name)
                    .await
                    .map_err(|e| e.to_string())?;
                match employee {
                    Some(e) => Some(e.id),
                    None => return Err(format!("unknown employee: {name}")),
                }
            }
        };

        if item.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }

        Ok(CalendarEventParams {
            kind: item.kind,
            title: item.title.clone(),
            start_ts,
            end_ts,
            all_day: item.all_day,
            status: item.status,
            employee_id,
            external_id: None,
            metadata: serde_json::json!({
                "origin": item.origin,
                "confidence": item.confidence,
                "source": item.source,
            }),
        })
    }

    /// Project the Event Store window covered by the given items into
    /// candidate shape for diffing.
    async fn store_window_candidates(
        &self,
        tenant_id: &str,
        items: &[CandidateEvent],
    ) -> Result<Vec<CandidateEvent>> {
        let moments: Vec<i64> = items
            .iter()
            .flat_map(|i| {
                parse_moment(&i.start)
                    .into_iter()
                    .chain(i.end.as_deref().and_then(parse_moment))
            })
            .collect();

        let (Some(&min), Some(&max)) = (moments.iter().min(), moments.iter().max()) else {
            return Ok(vec![]);
        };

        // Widen by a day so all-day boundaries on either side are included.
        let events = self
            .events
            .list_events_in_range(tenant_id, min - 86_400, max + 86_400)
            .await?;
        Ok(events.iter().map(event_to_candidate).collect())
    }
}

/// Parse an ISO date or datetime string into a Unix timestamp.
fn parse_moment(value: &str) -> Option<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }
    None
}

/// Enforce the upload bounds before any extraction work.
fn validate_upload(files: &[UploadedFile]) -> Result<()> {
    if files.is_empty() {
        return Err(ContendoError::Validation("no files uploaded".into()));
    }
    if files.len() > MAX_IMPORT_FILES {
        return Err(ContendoError::Validation(format!(
            "too many files: {} (limit {MAX_IMPORT_FILES})",
            files.len()
        )));
    }
    for file in files {
        if file.bytes.len() > MAX_IMPORT_FILE_BYTES {
            return Err(ContendoError::Validation(format!(
                "file '{}' exceeds the {} MB limit",
                file.name,
                MAX_IMPORT_FILE_BYTES / (1024 * 1024)
            )));
        }
        if !SUPPORTED_IMPORT_MIME.contains(&file.mime.as_str()) {
            return Err(ContendoError::Validation(format!(
                "file '{}' has unsupported type '{}'",
                file.name, file.mime
            )));
        }
    }
    Ok(())
}
