//! Mock port implementations for testing
//!
//! Provides in-memory mocks for the core ports, enabling deterministic unit
//! tests without database or network dependencies.

// Each test binary compiles its own copy; not every binary uses every mock.
#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use contendo_domain::{
    BatchStatus, CalendarEvent, CalendarEventParams, CandidateEvent, ContendoError, Employee,
    ImportBatch, ImportBatchSummary, ItemFailure, Result as DomainResult, SyncCounts,
    SyncDirection, SyncOutcome, SyncRun, SyncState, UndoLog, UploadedFile, WebhookChannel,
};
use contendo_core::{
    CalendarProvider, ChannelRegistration, EmployeeDirectory, EventStore, ExtractedDocument,
    FetchCursor, ImportBatchRepository, OcrExtractor, RemoteEventDraft, RemotePage, SyncError,
    SyncResult, SyncRunRepository, SyncStateRepository,
};
use parking_lot::Mutex;
use uuid::Uuid;

/// In-memory mock of the `EventStore` port.
///
/// Mirrors the transactional semantics of the SQLite adapter: multi-event
/// operations apply completely or not at all, and `revert_import` checks the
/// version stamps of batch-created events before touching anything.
#[derive(Default)]
pub struct InMemoryEventStore {
    events: Mutex<BTreeMap<String, CalendarEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<CalendarEvent> {
        self.events.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seed an event directly, bypassing the port.
    pub fn seed(&self, event: CalendarEvent) {
        self.events.lock().insert(event.id.clone(), event);
    }
}

fn event_from_params(tenant_id: &str, params: &CalendarEventParams, now: i64) -> CalendarEvent {
    CalendarEvent {
        id: Uuid::now_v7().to_string(),
        tenant_id: tenant_id.to_string(),
        kind: params.kind,
        title: params.title.clone(),
        start_ts: params.start_ts,
        end_ts: params.end_ts,
        all_day: params.all_day,
        status: params.status,
        employee_id: params.employee_id.clone(),
        external_id: params.external_id.clone(),
        metadata: params.metadata.clone(),
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn insert_events(
        &self,
        tenant_id: &str,
        params: &[CalendarEventParams],
    ) -> DomainResult<Vec<CalendarEvent>> {
        let now = Utc::now().timestamp();
        for p in params {
            p.validate()?;
        }
        let mut events = self.events.lock();
        let created: Vec<CalendarEvent> =
            params.iter().map(|p| event_from_params(tenant_id, p, now)).collect();
        for event in &created {
            events.insert(event.id.clone(), event.clone());
        }
        Ok(created)
    }

    async fn get_event(&self, tenant_id: &str, id: &str) -> DomainResult<Option<CalendarEvent>> {
        Ok(self.events.lock().get(id).filter(|e| e.tenant_id == tenant_id).cloned())
    }

    async fn find_by_external_id(
        &self,
        tenant_id: &str,
        external_id: &str,
    ) -> DomainResult<Option<CalendarEvent>> {
        Ok(self
            .events
            .lock()
            .values()
            .find(|e| e.tenant_id == tenant_id && e.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn list_events_in_range(
        &self,
        tenant_id: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> DomainResult<Vec<CalendarEvent>> {
        let mut hits: Vec<CalendarEvent> = self
            .events
            .lock()
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.start_ts >= start_ts && e.start_ts <= end_ts)
            .cloned()
            .collect();
        hits.sort_by_key(|e| e.start_ts);
        Ok(hits)
    }

    async fn list_pending_push(
        &self,
        tenant_id: &str,
        since: Option<i64>,
    ) -> DomainResult<Vec<CalendarEvent>> {
        let mut hits: Vec<CalendarEvent> = self
            .events
            .lock()
            .values()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && (e.external_id.is_none() || since.is_some_and(|s| e.updated_at > s))
            })
            .cloned()
            .collect();
        hits.sort_by_key(|e| e.start_ts);
        Ok(hits)
    }

    async fn update_event(
        &self,
        tenant_id: &str,
        event: &CalendarEvent,
    ) -> DomainResult<CalendarEvent> {
        let mut events = self.events.lock();
        let stored = events
            .get_mut(&event.id)
            .filter(|e| e.tenant_id == tenant_id)
            .ok_or_else(|| ContendoError::NotFound(format!("event not found: {}", event.id)))?;
        let mut updated = event.clone();
        updated.version = stored.version + 1;
        updated.updated_at = Utc::now().timestamp();
        *stored = updated.clone();
        Ok(updated)
    }

    async fn delete_event(&self, tenant_id: &str, id: &str) -> DomainResult<bool> {
        let mut events = self.events.lock();
        if events.get(id).is_some_and(|e| e.tenant_id == tenant_id) {
            events.remove(id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete_by_external_id(
        &self,
        tenant_id: &str,
        external_id: &str,
    ) -> DomainResult<bool> {
        let mut events = self.events.lock();
        let id = events
            .values()
            .find(|e| e.tenant_id == tenant_id && e.external_id.as_deref() == Some(external_id))
            .map(|e| e.id.clone());
        match id {
            Some(id) => {
                events.remove(&id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_synced(&self, tenant_id: &str, id: &str, external_id: &str) -> DomainResult<()> {
        let mut events = self.events.lock();
        let stored = events
            .get_mut(id)
            .filter(|e| e.tenant_id == tenant_id)
            .ok_or_else(|| ContendoError::NotFound(format!("event not found: {id}")))?;
        stored.external_id = Some(external_id.to_string());
        stored.version += 1;
        stored.updated_at = Utc::now().timestamp();
        Ok(())
    }

    async fn revert_import(&self, tenant_id: &str, undo: &UndoLog) -> DomainResult<()> {
        let mut events = self.events.lock();

        // Verify every stamp before mutating anything.
        for stamp in &undo.created {
            match events.get(&stamp.event_id) {
                Some(stored) if stored.tenant_id == tenant_id => {
                    if stored.version != stamp.version {
                        return Err(ContendoError::Conflict(format!(
                            "event {} was modified after the import (version {} != {})",
                            stamp.event_id, stored.version, stamp.version
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
            events.remove(&stamp.event_id);
        }
        for prior in undo.updated.iter().chain(undo.deleted.iter()) {
            events.insert(prior.id.clone(), prior.clone());
        }
        Ok(())
    }
}

/// In-memory mock of the `ImportBatchRepository` port.
#[derive(Default)]
pub struct InMemoryBatchRepository {
    batches: Mutex<BTreeMap<String, ImportBatch>>,
}

impl InMemoryBatchRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ImportBatchRepository for InMemoryBatchRepository {
    async fn create_batch(&self, batch: &ImportBatch) -> DomainResult<()> {
        self.batches.lock().insert(batch.id.clone(), batch.clone());
        Ok(())
    }

    async fn get_batch(&self, tenant_id: &str, id: &str) -> DomainResult<Option<ImportBatch>> {
        Ok(self.batches.lock().get(id).filter(|b| b.tenant_id == tenant_id).cloned())
    }

    async fn list_batches(&self, tenant_id: &str) -> DomainResult<Vec<ImportBatchSummary>> {
        let mut summaries: Vec<ImportBatchSummary> = self
            .batches
            .lock()
            .values()
            .filter(|b| b.tenant_id == tenant_id)
            .map(|b| ImportBatchSummary {
                id: b.id.clone(),
                status: b.status,
                file_count: b.files.len(),
                item_count: b.items.len(),
                created_at: b.created_at,
                created_by: b.created_by.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(summaries)
    }

    async fn transition(
        &self,
        tenant_id: &str,
        id: &str,
        from: BatchStatus,
        to: BatchStatus,
        items: Option<&[CandidateEvent]>,
        undo_log: Option<&UndoLog>,
    ) -> DomainResult<bool> {
        let mut batches = self.batches.lock();
        let Some(batch) = batches.get_mut(id).filter(|b| b.tenant_id == tenant_id) else {
            return Ok(false);
        };
        if batch.status != from {
            return Ok(false);
        }
        batch.status = to;
        if let Some(items) = items {
            batch.items = items.to_vec();
        }
        if let Some(log) = undo_log {
            batch.undo_log = Some(log.clone());
        }
        Ok(true)
    }
}

/// Extractor mock that returns canned text per file name.
#[derive(Default)]
pub struct FixedExtractor {
    texts: Mutex<BTreeMap<String, String>>,
}

impl FixedExtractor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_text(self: Arc<Self>, file_name: &str, text: &str) -> Arc<Self> {
        self.texts.lock().insert(file_name.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl OcrExtractor for FixedExtractor {
    async fn extract(&self, file: &UploadedFile) -> DomainResult<ExtractedDocument> {
        let text = self
            .texts
            .lock()
            .get(&file.name)
            .cloned()
            .unwrap_or_else(|| String::from_utf8_lossy(&file.bytes).into_owned());
        Ok(ExtractedDocument { text, page_count: 1 })
    }
}

/// Directory mock backed by a fixed employee list.
pub struct StaticEmployeeDirectory {
    employees: Vec<Employee>,
}

impl StaticEmployeeDirectory {
    pub fn new(names: &[&str]) -> Arc<Self> {
        let employees = names
            .iter()
            .enumerate()
            .map(|(i, name)| Employee {
                id: format!("emp-{}", i + 1),
                tenant_id: "t1".to_string(),
                display_name: (*name).to_string(),
                email: None,
                active: true,
            })
            .collect();
        Arc::new(Self { employees })
    }
}

#[async_trait]
impl EmployeeDirectory for StaticEmployeeDirectory {
    async fn resolve_name(&self, tenant_id: &str, name: &str) -> DomainResult<Option<Employee>> {
        Ok(self
            .employees
            .iter()
            .find(|e| {
                e.tenant_id == tenant_id && e.display_name.to_lowercase() == name.to_lowercase()
            })
            .cloned())
    }
}

/// Scripted provider failure
pub enum ProviderFailure {
    Auth,
    Server,
    CursorExpired,
}

impl ProviderFailure {
    fn to_error(&self) -> SyncError {
        match self {
            Self::Auth => SyncError::Auth("invalid_grant".into()),
            Self::Server => SyncError::Server("HTTP 503".into()),
            Self::CursorExpired => SyncError::CursorExpired,
        }
    }
}

/// Programmable mock of the `CalendarProvider` port.
///
/// Fetches drain `pages` after draining `fetch_failures`; create/update
/// calls are recorded for assertions.
#[derive(Default)]
pub struct MockProvider {
    pub pages: Mutex<VecDeque<RemotePage>>,
    pub fetch_failures: Mutex<VecDeque<ProviderFailure>>,
    pub created: Mutex<Vec<RemoteEventDraft>>,
    pub updated: Mutex<Vec<(String, RemoteEventDraft)>>,
    pub deleted: Mutex<Vec<String>>,
    pub stop_fails: Mutex<bool>,
    pub stopped: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue_page(&self, page: RemotePage) {
        self.pages.lock().push_back(page);
    }

    pub fn queue_failure(&self, failure: ProviderFailure) {
        self.fetch_failures.lock().push_back(failure);
    }
}

#[async_trait]
impl CalendarProvider for MockProvider {
    async fn fetch_events(
        &self,
        _tenant_id: &str,
        _cursor: &FetchCursor,
        _page_token: Option<&str>,
    ) -> SyncResult<RemotePage> {
        if let Some(failure) = self.fetch_failures.lock().pop_front() {
            return Err(failure.to_error());
        }
        Ok(self.pages.lock().pop_front().unwrap_or_default())
    }

    async fn create_event(
        &self,
        _tenant_id: &str,
        draft: &RemoteEventDraft,
    ) -> SyncResult<String> {
        let mut created = self.created.lock();
        created.push(draft.clone());
        Ok(format!("g-evt-{}", created.len()))
    }

    async fn update_event(
        &self,
        _tenant_id: &str,
        external_id: &str,
        draft: &RemoteEventDraft,
    ) -> SyncResult<()> {
        self.updated.lock().push((external_id.to_string(), draft.clone()));
        Ok(())
    }

    async fn delete_event(&self, _tenant_id: &str, external_id: &str) -> SyncResult<()> {
        self.deleted.lock().push(external_id.to_string());
        Ok(())
    }

    async fn register_channel(
        &self,
        _tenant_id: &str,
        channel_id: &str,
        _token: &str,
    ) -> SyncResult<ChannelRegistration> {
        Ok(ChannelRegistration {
            resource_id: format!("res-{channel_id}"),
            expiry: Utc::now().timestamp() + 3_600,
        })
    }

    async fn stop_channel(
        &self,
        _tenant_id: &str,
        channel_id: &str,
        _resource_id: &str,
    ) -> SyncResult<()> {
        if *self.stop_fails.lock() {
            return Err(SyncError::Client("channel already expired".into()));
        }
        self.stopped.lock().push(channel_id.to_string());
        Ok(())
    }
}

/// In-memory mock of the `SyncRunRepository` port enforcing the
/// single-running-run guarantee.
#[derive(Default)]
pub struct InMemoryRunRepository {
    runs: Mutex<Vec<SyncRun>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a run directly (e.g. a stuck running run).
    pub fn seed(&self, run: SyncRun) {
        self.runs.lock().push(run);
    }

    pub fn all(&self) -> Vec<SyncRun> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl SyncRunRepository for InMemoryRunRepository {
    async fn start_run(
        &self,
        tenant_id: &str,
        direction: SyncDirection,
        started_at: i64,
    ) -> DomainResult<SyncRun> {
        let mut runs = self.runs.lock();
        if runs.iter().any(|r| r.tenant_id == tenant_id && r.is_running()) {
            return Err(ContendoError::Conflict("a sync run is already running".into()));
        }
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
        runs.push(run.clone());
        Ok(run)
    }

    async fn finish_run(
        &self,
        tenant_id: &str,
        run_id: &str,
        outcome: SyncOutcome,
        counts: &SyncCounts,
        failures: &[ItemFailure],
        finished_at: i64,
    ) -> DomainResult<()> {
        let mut runs = self.runs.lock();
        let run = runs
            .iter_mut()
            .find(|r| r.tenant_id == tenant_id && r.id == run_id)
            .ok_or_else(|| ContendoError::NotFound(format!("sync run not found: {run_id}")))?;
        run.finished_at = Some(finished_at);
        run.outcome = Some(outcome);
        run.counts = *counts;
        run.failures = failures.to_vec();
        Ok(())
    }

    async fn history(&self, tenant_id: &str, limit: usize) -> DomainResult<Vec<SyncRun>> {
        let mut runs: Vec<SyncRun> =
            self.runs.lock().iter().filter(|r| r.tenant_id == tenant_id).cloned().collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }
}

/// In-memory mock of the `SyncStateRepository` port.
#[derive(Default)]
pub struct InMemoryStateRepository {
    states: Mutex<BTreeMap<String, SyncState>>,
}

impl InMemoryStateRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed an enabled, connected state for a tenant.
    pub fn enable(&self, tenant_id: &str) {
        let now = Utc::now().timestamp();
        let mut state = SyncState::disconnected(tenant_id, now);
        state.connected = true;
        state.enabled = true;
        self.states.lock().insert(tenant_id.to_string(), state);
    }

    pub fn set(&self, state: SyncState) {
        self.states.lock().insert(state.tenant_id.clone(), state);
    }

    pub fn snapshot(&self, tenant_id: &str) -> Option<SyncState> {
        self.states.lock().get(tenant_id).cloned()
    }
}

#[async_trait]
impl SyncStateRepository for InMemoryStateRepository {
    async fn get_or_default(&self, tenant_id: &str) -> DomainResult<SyncState> {
        Ok(self
            .states
            .lock()
            .get(tenant_id)
            .cloned()
            .unwrap_or_else(|| SyncState::disconnected(tenant_id, Utc::now().timestamp())))
    }

    async fn find_by_channel(&self, channel_id: &str) -> DomainResult<Option<SyncState>> {
        Ok(self
            .states
            .lock()
            .values()
            .find(|s| s.channel.as_ref().is_some_and(|c| c.id == channel_id))
            .cloned())
    }

    async fn set_last_sync(&self, tenant_id: &str, ts: i64) -> DomainResult<()> {
        self.mutate(tenant_id, |s| s.last_sync = Some(ts));
        Ok(())
    }

    async fn set_sync_token(&self, tenant_id: &str, token: Option<&str>) -> DomainResult<()> {
        self.mutate(tenant_id, |s| s.sync_token = token.map(str::to_string));
        Ok(())
    }

    async fn set_enabled(&self, tenant_id: &str, enabled: bool) -> DomainResult<()> {
        self.mutate(tenant_id, |s| s.enabled = enabled);
        Ok(())
    }

    async fn set_channel(
        &self,
        tenant_id: &str,
        channel: Option<&WebhookChannel>,
    ) -> DomainResult<()> {
        self.mutate(tenant_id, |s| s.channel = channel.cloned());
        Ok(())
    }
}

impl InMemoryStateRepository {
    fn mutate(&self, tenant_id: &str, apply: impl FnOnce(&mut SyncState)) {
        let mut states = self.states.lock();
        let state = states
            .entry(tenant_id.to_string())
            .or_insert_with(|| SyncState::disconnected(tenant_id, Utc::now().timestamp()));
        apply(state);
        state.updated_at = Utc::now().timestamp();
    }
}
