//! Port interfaces for sync operations

use async_trait::async_trait;
use contendo_domain::{
    ItemFailure, Result, SyncCounts, SyncDirection, SyncOutcome, SyncRun, SyncState,
    WebhookChannel,
};

use super::errors::SyncResult;

/// Raw event from the provider API
#[derive(Debug, Clone)]
pub struct RemoteEvent {
    pub id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// RFC 3339 datetime, or `YYYY-MM-DD` for all-day events.
    pub start: String,
    pub end: Option<String>,
    pub all_day: bool,
    /// Provider marked the event as deleted.
    pub cancelled: bool,
    /// Out-of-office / busy-free marker, mapped to non-working days.
    pub out_of_office: bool,
    pub updated_ts: Option<i64>,
}

/// One page of a provider fetch
#[derive(Debug, Clone, Default)]
pub struct RemotePage {
    pub events: Vec<RemoteEvent>,
    pub next_page_token: Option<String>,
    pub next_sync_token: Option<String>,
}

/// Where to fetch from: an incremental cursor or a time window
#[derive(Debug, Clone)]
pub enum FetchCursor {
    Token(String),
    Window { start_ts: i64, end_ts: i64 },
}

/// Outgoing event payload for push operations
#[derive(Debug, Clone)]
pub struct RemoteEventDraft {
    pub summary: String,
    pub description: Option<String>,
    pub start_ts: i64,
    pub end_ts: i64,
    pub all_day: bool,
}

/// Provider-side result of a channel registration
#[derive(Debug, Clone)]
pub struct ChannelRegistration {
    pub resource_id: String,
    pub expiry: i64,
}

/// Trait for the external calendar provider
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Fetch one page of events at the given cursor.
    async fn fetch_events(
        &self,
        tenant_id: &str,
        cursor: &FetchCursor,
        page_token: Option<&str>,
    ) -> SyncResult<RemotePage>;

    /// Create an event; returns the provider-side id.
    async fn create_event(&self, tenant_id: &str, draft: &RemoteEventDraft) -> SyncResult<String>;

    /// Overwrite an existing provider event.
    async fn update_event(
        &self,
        tenant_id: &str,
        external_id: &str,
        draft: &RemoteEventDraft,
    ) -> SyncResult<()>;

    /// Delete a provider event.
    async fn delete_event(&self, tenant_id: &str, external_id: &str) -> SyncResult<()>;

    /// Register a webhook notification channel.
    async fn register_channel(
        &self,
        tenant_id: &str,
        channel_id: &str,
        token: &str,
    ) -> SyncResult<ChannelRegistration>;

    /// Deregister a webhook notification channel.
    async fn stop_channel(
        &self,
        tenant_id: &str,
        channel_id: &str,
        resource_id: &str,
    ) -> SyncResult<()>;
}

/// Trait for the append-only sync run history
#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    /// Insert a run in running state. Fails with `Conflict` when another run
    /// of this tenant is still running.
    async fn start_run(
        &self,
        tenant_id: &str,
        direction: SyncDirection,
        started_at: i64,
    ) -> Result<SyncRun>;

    /// Record the terminal outcome of a run.
    async fn finish_run(
        &self,
        tenant_id: &str,
        run_id: &str,
        outcome: SyncOutcome,
        counts: &SyncCounts,
        failures: &[ItemFailure],
        finished_at: i64,
    ) -> Result<()>;

    /// Past runs, most recent first.
    async fn history(&self, tenant_id: &str, limit: usize) -> Result<Vec<SyncRun>>;
}

/// Trait for the per-tenant sync state singleton
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    /// Current state, or a disconnected default for unknown tenants.
    async fn get_or_default(&self, tenant_id: &str) -> Result<SyncState>;

    /// Reverse lookup used by the webhook receiver.
    async fn find_by_channel(&self, channel_id: &str) -> Result<Option<SyncState>>;

    async fn set_last_sync(&self, tenant_id: &str, ts: i64) -> Result<()>;

    async fn set_sync_token(&self, tenant_id: &str, token: Option<&str>) -> Result<()>;

    async fn set_enabled(&self, tenant_id: &str, enabled: bool) -> Result<()>;

    async fn set_channel(&self, tenant_id: &str, channel: Option<&WebhookChannel>) -> Result<()>;
}
