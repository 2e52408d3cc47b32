//! Calendar sync engine - core reconciliation logic
//!
//! One `SyncRun` per trigger: push, pull, or pull-then-push. Provider calls
//! retry transient failures with exponential backoff inside the run; what
//! cannot be reconciled is recorded per item and surfaces as a `partial`
//! outcome. Authentication failures finish the run `failed` and disable sync
//! until an admin re-authorizes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use contendo_domain::constants::SYNC_HISTORY_LIMIT;
use contendo_domain::{
    CalendarEvent, CalendarEventParams, ContendoError, EventKind, ItemFailure, Result, SyncCounts,
    SyncDirection, SyncOutcome, SyncRun, SyncState,
};
use tracing::{debug, info, instrument, warn};

use super::errors::{SyncError, SyncErrorCategory, SyncResult};
use super::ports::{
    CalendarProvider, FetchCursor, RemoteEvent, RemoteEventDraft, SyncRunRepository,
    SyncStateRepository,
};
use crate::import::ports::EventStore;

/// Tuning knobs for the sync engine
#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    /// Bound on attempts per provider call within a run.
    pub max_attempts: u32,
    /// Fetch window when no incremental cursor is available.
    pub lookback_days: i64,
    pub lookahead_days: i64,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self { max_attempts: 3, lookback_days: 30, lookahead_days: 90 }
    }
}

/// Calendar sync engine
pub struct SyncEngine {
    provider: Arc<dyn CalendarProvider>,
    events: Arc<dyn EventStore>,
    runs: Arc<dyn SyncRunRepository>,
    state: Arc<dyn SyncStateRepository>,
    config: SyncEngineConfig,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(
        provider: Arc<dyn CalendarProvider>,
        events: Arc<dyn EventStore>,
        runs: Arc<dyn SyncRunRepository>,
        state: Arc<dyn SyncStateRepository>,
        config: SyncEngineConfig,
    ) -> Self {
        let config = SyncEngineConfig { max_attempts: config.max_attempts.max(1), ..config };
        Self { provider, events, runs, state, config }
    }

    /// Push local events to the provider. Local wins on conflicting edits.
    pub async fn sync_to_external(&self, tenant_id: &str) -> Result<SyncRun> {
        self.execute(tenant_id, SyncDirection::ToExternal).await
    }

    /// Pull provider changes into the Event Store. External wins.
    pub async fn sync_from_external(&self, tenant_id: &str) -> Result<SyncRun> {
        self.execute(tenant_id, SyncDirection::FromExternal).await
    }

    /// Pull fully, then push, within one run. Both-sides-changed conflicts
    /// resolve by last-modified timestamp.
    pub async fn sync_bidirectional(&self, tenant_id: &str) -> Result<SyncRun> {
        self.execute(tenant_id, SyncDirection::Bidirectional).await
    }

    /// Current sync state snapshot.
    pub async fn status(&self, tenant_id: &str) -> Result<SyncState> {
        self.state.get_or_default(tenant_id).await
    }

    /// Past runs, most recent first.
    pub async fn history(&self, tenant_id: &str) -> Result<Vec<SyncRun>> {
        self.runs.history(tenant_id, SYNC_HISTORY_LIMIT).await
    }

    #[instrument(skip(self), fields(direction = direction.as_str()))]
    async fn execute(&self, tenant_id: &str, direction: SyncDirection) -> Result<SyncRun> {
        let state = self.state.get_or_default(tenant_id).await?;
        if !state.enabled {
            return Err(ContendoError::Conflict(
                "calendar sync is disabled; re-authorize the provider to enable it".into(),
            ));
        }

        let started_at = Utc::now().timestamp();
        // The repository refuses a second running row per tenant, which is
        // what serializes concurrent triggers across processes.
        let run = self.runs.start_run(tenant_id, direction, started_at).await?;
        info!(tenant_id, run_id = %run.id, "sync run started");

        let mut counts = SyncCounts::default();
        let mut failures: Vec<ItemFailure> = Vec::new();

        let phase_result = match direction {
            SyncDirection::FromExternal => {
                self.pull(tenant_id, &state, None, &mut counts, &mut failures).await
            }
            SyncDirection::ToExternal => {
                self.push(tenant_id, state.last_sync, None, &mut counts, &mut failures).await
            }
            SyncDirection::Bidirectional => {
                let since = Some(state.last_sync.unwrap_or(0));
                match self.pull(tenant_id, &state, since, &mut counts, &mut failures).await {
                    Ok(()) => {
                        // Anything the pull phase just wrote carries an
                        // updated_at >= started_at; pushing it back would
                        // echo the provider's own change to it.
                        self.push(
                            tenant_id,
                            state.last_sync,
                            Some(started_at),
                            &mut counts,
                            &mut failures,
                        )
                        .await
                    }
                    Err(e) => Err(e),
                }
            }
        };

        let finished_at = Utc::now().timestamp();
        let outcome = match phase_result {
            Ok(()) if counts.failed == 0 => SyncOutcome::Success,
            Ok(()) => SyncOutcome::Partial,
            Err(e) => {
                failures.push(ItemFailure {
                    event_id: None,
                    external_id: None,
                    message: e.to_string(),
                });
                match e.category() {
                    SyncErrorCategory::Authentication => {
                        warn!(tenant_id, "provider rejected credentials, disabling sync");
                        self.state.set_enabled(tenant_id, false).await?;
                        SyncOutcome::Failed
                    }
                    SyncErrorCategory::Client | SyncErrorCategory::Config => SyncOutcome::Failed,
                    _ => SyncOutcome::Partial,
                }
            }
        };

        self.runs
            .finish_run(tenant_id, &run.id, outcome, &counts, &failures, finished_at)
            .await?;
        if outcome == SyncOutcome::Success {
            self.state.set_last_sync(tenant_id, finished_at).await?;
        }

        info!(
            tenant_id,
            run_id = %run.id,
            outcome = outcome.as_str(),
            created = counts.created,
            updated = counts.updated,
            deleted = counts.deleted,
            skipped = counts.skipped,
            conflicted = counts.conflicted,
            failed = counts.failed,
            "sync run finished"
        );

        Ok(SyncRun {
            finished_at: Some(finished_at),
            outcome: Some(outcome),
            counts,
            failures,
            ..run
        })
    }

    /// Pull provider changes. `conflict_since` is set in bidirectional mode:
    /// a local edit newer than it turns an incoming change into a conflict,
    /// resolved by last-modified timestamp.
    async fn pull(
        &self,
        tenant_id: &str,
        state: &SyncState,
        conflict_since: Option<i64>,
        counts: &mut SyncCounts,
        failures: &mut Vec<ItemFailure>,
    ) -> SyncResult<()> {
        let mut cursor = match &state.sync_token {
            Some(token) => FetchCursor::Token(token.clone()),
            None => self.window(),
        };
        let mut page_token: Option<String> = None;
        let mut new_sync_token: Option<String> = None;
        let mut resynced = false;

        loop {
            let fetched = self
                .op_with_retry(|| {
                    self.provider.fetch_events(tenant_id, &cursor, page_token.as_deref())
                })
                .await;

            let page = match fetched {
                Ok(page) => page,
                Err(SyncError::CursorExpired) if !resynced => {
                    warn!(tenant_id, "sync cursor invalidated (410 GONE), restarting full fetch");
                    self.state.set_sync_token(tenant_id, None).await?;
                    cursor = self.window();
                    page_token = None;
                    resynced = true;
                    continue;
                }
                Err(e) => return Err(e),
            };

            for remote in &page.events {
                if let Err(message) =
                    self.apply_remote(tenant_id, remote, conflict_since, counts).await
                {
                    counts.failed += 1;
                    failures.push(ItemFailure {
                        event_id: None,
                        external_id: Some(remote.id.clone()),
                        message,
                    });
                }
            }

            if page.next_sync_token.is_some() {
                new_sync_token = page.next_sync_token;
            }
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        if let Some(token) = new_sync_token {
            self.state.set_sync_token(tenant_id, Some(&token)).await?;
        }
        Ok(())
    }

    /// Apply one remote event to the Event Store.
    async fn apply_remote(
        &self,
        tenant_id: &str,
        remote: &RemoteEvent,
        conflict_since: Option<i64>,
        counts: &mut SyncCounts,
    ) -> std::result::Result<(), String> {
        if remote.cancelled {
            let removed = self
                .events
                .delete_by_external_id(tenant_id, &remote.id)
                .await
                .map_err(|e| e.to_string())?;
            if removed {
                counts.deleted += 1;
            } else {
                counts.skipped += 1;
            }
            return Ok(());
        }

        let start_ts = parse_remote_moment(&remote.start)
            .ok_or_else(|| format!("invalid start '{}'", remote.start))?;
        let end_ts = match remote.end.as_deref() {
            None => None,
            Some(end) => {
                Some(parse_remote_moment(end).ok_or_else(|| format!("invalid end '{end}'"))?)
            }
        };

        let kind = if remote.out_of_office && remote.all_day {
            EventKind::NonWorkingDay
        } else {
            EventKind::CompanyCalendar
        };
        let title = remote
            .summary
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "Sin título".to_string());

        let existing = self
            .events
            .find_by_external_id(tenant_id, &remote.id)
            .await
            .map_err(|e| e.to_string())?;

        match existing {
            None => {
                let params = CalendarEventParams {
                    kind,
                    title,
                    start_ts,
                    end_ts,
                    all_day: remote.all_day,
                    status: None,
                    employee_id: None,
                    external_id: Some(remote.id.clone()),
                    metadata: serde_json::json!({ "description": remote.description }),
                };
                self.events
                    .insert_events(tenant_id, std::slice::from_ref(&params))
                    .await
                    .map_err(|e| e.to_string())?;
                counts.created += 1;
            }
            Some(mut local) => {
                let differs = local.title != title
                    || local.start_ts != start_ts
                    || local.end_ts != end_ts
                    || local.all_day != remote.all_day;
                if !differs {
                    counts.skipped += 1;
                    return Ok(());
                }

                if let Some(since) = conflict_since {
                    if local.updated_at > since {
                        counts.conflicted += 1;
                        let remote_newer = remote.updated_ts.unwrap_or(i64::MAX) >= local.updated_at;
                        if !remote_newer {
                            // Local edit is newer; the push phase carries it out.
                            counts.skipped += 1;
                            return Ok(());
                        }
                    }
                }

                local.kind = kind;
                local.title = title;
                local.start_ts = start_ts;
                local.end_ts = end_ts;
                local.all_day = remote.all_day;
                self.events
                    .update_event(tenant_id, &local)
                    .await
                    .map_err(|e| e.to_string())?;
                counts.updated += 1;
            }
        }
        Ok(())
    }

    /// Push local events that never reached the provider or changed since
    /// the last successful sync.
    async fn push(
        &self,
        tenant_id: &str,
        since: Option<i64>,
        cutoff: Option<i64>,
        counts: &mut SyncCounts,
        failures: &mut Vec<ItemFailure>,
    ) -> SyncResult<()> {
        let mut pending = self.events.list_pending_push(tenant_id, since).await?;
        if let Some(cutoff) = cutoff {
            pending.retain(|e| e.updated_at < cutoff || e.external_id.is_none());
        }
        debug!(tenant_id, pending = pending.len(), "pushing local events");

        for event in pending {
            let draft = draft_from_event(&event);
            let pushed: SyncResult<()> = match event.external_id.as_deref() {
                None => {
                    match self
                        .op_with_retry(|| self.provider.create_event(tenant_id, &draft))
                        .await
                    {
                        Ok(external_id) => {
                            self.events.mark_synced(tenant_id, &event.id, &external_id).await?;
                            counts.created += 1;
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
                Some(external_id) => {
                    match self
                        .op_with_retry(|| self.provider.update_event(tenant_id, external_id, &draft))
                        .await
                    {
                        Ok(()) => {
                            counts.updated += 1;
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
            };

            if let Err(e) = pushed {
                if e.category() == SyncErrorCategory::Authentication {
                    return Err(e);
                }
                counts.failed += 1;
                failures.push(ItemFailure {
                    event_id: Some(event.id.clone()),
                    external_id: event.external_id.clone(),
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Retry a provider call on transient failures, with bounded backoff.
    async fn op_with_retry<T, F, Fut>(&self, mut op: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.should_retry() && attempt + 1 < self.config.max_attempts => {
                    let delay = calculate_backoff(attempt);
                    debug!(attempt, delay_ms = delay, error = %e, "retrying provider call");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn window(&self) -> FetchCursor {
        let now = Utc::now().timestamp();
        FetchCursor::Window {
            start_ts: now - self.config.lookback_days * 86_400,
            end_ts: now + self.config.lookahead_days * 86_400,
        }
    }
}

/// Build the outgoing payload for a local event.
fn draft_from_event(event: &CalendarEvent) -> RemoteEventDraft {
    let end_ts = event.end_ts.unwrap_or(if event.all_day {
        event.start_ts
    } else {
        event.start_ts + 3_600
    });
    RemoteEventDraft {
        summary: event.title.clone(),
        description: None,
        start_ts: event.start_ts,
        end_ts,
        all_day: event.all_day,
    }
}

/// Parse a provider timestamp: RFC 3339, or a bare date for all-day events.
fn parse_remote_moment(value: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).timestamp());
    }
    let date = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

/// Calculate exponential backoff delay with jitter
pub fn calculate_backoff(attempt: u32) -> u64 {
    let base_delay = 500u64; // milliseconds
    let max_delay = 16_000u64;

    let delay = base_delay * 2u64.pow(attempt.min(5));
    let capped_delay = delay.min(max_delay);

    // Add ±25% jitter
    use rand::Rng;
    let jitter_range = (capped_delay as f64 * 0.25) as u64;
    let mut rng = rand::thread_rng();
    let jitter = rng.gen_range(0..=jitter_range * 2) as i64 - jitter_range as i64;

    (capped_delay as i64 + jitter).max(0) as u64
}
