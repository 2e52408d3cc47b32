//! Google Calendar provider implementation
//!
//! Implements the `CalendarProvider` port against the Calendar v3 API:
//! incremental event listing with sync tokens, event writes, and webhook
//! channel registration. Access tokens are minted per tenant from the stored
//! refresh credential and cached until shortly before expiry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use contendo_core::{
    CalendarProvider, ChannelRegistration, FetchCursor, RemoteEvent, RemoteEventDraft, RemotePage,
    SyncError, SyncResult, SyncStateRepository,
};
use contendo_domain::constants::WEBHOOK_CHANNEL_TTL_SECS;
use contendo_domain::GoogleConfig;
use parking_lot::RwLock;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const LIST_FIELDS: &str = "items(id,status,summary,description,start,end,updated,transparency,eventType),nextPageToken,nextSyncToken";

/// Refresh the cached token this many seconds before it actually expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Google Calendar provider
pub struct GoogleCalendarProvider {
    http: Client,
    config: GoogleConfig,
    state: Arc<dyn SyncStateRepository>,
    api_base: String,
    token_url: String,
    tokens: RwLock<HashMap<String, CachedToken>>,
}

impl GoogleCalendarProvider {
    /// Create a provider against the production Google endpoints.
    pub fn new(config: GoogleConfig, state: Arc<dyn SyncStateRepository>) -> Self {
        Self::with_endpoints(config, state, GOOGLE_CALENDAR_API_BASE, GOOGLE_TOKEN_URL)
    }

    /// Create a provider against custom endpoints (used by tests).
    pub fn with_endpoints(
        config: GoogleConfig,
        state: Arc<dyn SyncStateRepository>,
        api_base: &str,
        token_url: &str,
    ) -> Self {
        Self {
            http: Client::new(),
            config,
            state,
            api_base: api_base.trim_end_matches('/').to_string(),
            token_url: token_url.to_string(),
            tokens: RwLock::new(HashMap::new()),
        }
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/{}/events", self.api_base, self.config.calendar_id)
    }

    /// Get a valid access token for the tenant, refreshing when needed.
    async fn access_token(&self, tenant_id: &str) -> SyncResult<String> {
        let now = Utc::now().timestamp();
        if let Some(cached) = self.tokens.read().get(tenant_id) {
            if cached.expires_at > now + TOKEN_EXPIRY_MARGIN_SECS {
                return Ok(cached.access_token.clone());
            }
        }

        let state = self.state.get_or_default(tenant_id).await?;
        let refresh_token = state.refresh_token.ok_or_else(|| {
            SyncError::Auth(format!("tenant {tenant_id} has no stored provider credential"))
        })?;

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("token refresh request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(SyncError::Auth(format!("token refresh failed ({status}): {body}")));
        }

        let refreshed: TokenRefreshResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("failed to parse token response: {e}")))?;

        let expires_at = now + refreshed.expires_in;
        self.tokens.write().insert(
            tenant_id.to_string(),
            CachedToken { access_token: refreshed.access_token.clone(), expires_at },
        );
        debug!(tenant_id, expires_at, "refreshed provider access token");
        Ok(refreshed.access_token)
    }
}

async fn error_from_response(response: Response) -> SyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
    match status.as_u16() {
        401 | 403 => SyncError::Auth(format!("google api ({status}): {body}")),
        410 => SyncError::CursorExpired,
        429 => SyncError::RateLimit(format!("google api ({status}): {body}")),
        s if s >= 500 => SyncError::Server(format!("google api ({status}): {body}")),
        _ => SyncError::Client(format!("google api ({status}): {body}")),
    }
}

fn network_error(e: reqwest::Error) -> SyncError {
    SyncError::Network(format!("google api request failed: {e}"))
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    #[instrument(skip(self, cursor))]
    async fn fetch_events(
        &self,
        tenant_id: &str,
        cursor: &FetchCursor,
        page_token: Option<&str>,
    ) -> SyncResult<RemotePage> {
        let access_token = self.access_token(tenant_id).await?;

        let mut query: Vec<(&str, String)> = match cursor {
            FetchCursor::Token(token) => {
                vec![("syncToken", token.clone()), ("fields", LIST_FIELDS.to_string())]
            }
            FetchCursor::Window { start_ts, end_ts } => vec![
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("timeMin", ts_to_rfc3339(*start_ts)),
                ("timeMax", ts_to_rfc3339(*end_ts)),
                ("timeZone", "UTC".to_string()),
                ("fields", LIST_FIELDS.to_string()),
            ],
        };
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self
            .http
            .get(self.events_url())
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let listing: GoogleEventsResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Client(format!("failed to parse google response: {e}")))?;

        let events = listing.items.into_iter().map(remote_from_google).collect();
        Ok(RemotePage {
            events,
            next_page_token: listing.next_page_token,
            next_sync_token: listing.next_sync_token,
        })
    }

    #[instrument(skip(self, draft))]
    async fn create_event(&self, tenant_id: &str, draft: &RemoteEventDraft) -> SyncResult<String> {
        let access_token = self.access_token(tenant_id).await?;

        let response = self
            .http
            .post(self.events_url())
            .bearer_auth(access_token)
            .json(&event_body(draft))
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let created: CreatedEventResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Client(format!("failed to parse google response: {e}")))?;
        Ok(created.id)
    }

    #[instrument(skip(self, draft))]
    async fn update_event(
        &self,
        tenant_id: &str,
        external_id: &str,
        draft: &RemoteEventDraft,
    ) -> SyncResult<()> {
        let access_token = self.access_token(tenant_id).await?;
        let url = format!("{}/{}", self.events_url(), external_id);

        let response = self
            .http
            .patch(&url)
            .bearer_auth(access_token)
            .json(&event_body(draft))
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_event(&self, tenant_id: &str, external_id: &str) -> SyncResult<()> {
        let access_token = self.access_token(tenant_id).await?;
        let url = format!("{}/{}", self.events_url(), external_id);

        let response =
            self.http.delete(&url).bearer_auth(access_token).send().await.map_err(network_error)?;

        // Already-deleted remote events count as deleted.
        if matches!(response.status().as_u16(), 404 | 410) {
            warn!(external_id, "remote event already gone");
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn register_channel(
        &self,
        tenant_id: &str,
        channel_id: &str,
        token: &str,
    ) -> SyncResult<ChannelRegistration> {
        let access_token = self.access_token(tenant_id).await?;
        let url = format!("{}/watch", self.events_url());

        let expiration_ms = (Utc::now().timestamp() + WEBHOOK_CHANNEL_TTL_SECS) * 1_000;
        let body = serde_json::json!({
            "id": channel_id,
            "type": "web_hook",
            "address": self.config.webhook_callback_url,
            "token": token,
            "expiration": expiration_ms.to_string(),
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let watch: WatchResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Client(format!("failed to parse watch response: {e}")))?;

        let expiry = watch
            .expiration
            .and_then(|ms| ms.parse::<i64>().ok())
            .map_or(Utc::now().timestamp() + WEBHOOK_CHANNEL_TTL_SECS, |ms| ms / 1_000);

        Ok(ChannelRegistration { resource_id: watch.resource_id, expiry })
    }

    #[instrument(skip(self))]
    async fn stop_channel(
        &self,
        tenant_id: &str,
        channel_id: &str,
        resource_id: &str,
    ) -> SyncResult<()> {
        let access_token = self.access_token(tenant_id).await?;
        let url = format!("{}/channels/stop", self.api_base);

        let body = serde_json::json!({ "id": channel_id, "resourceId": resource_id });
        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}

fn remote_from_google(event: GoogleCalendarEvent) -> RemoteEvent {
    let cancelled = event.status.as_deref() == Some("cancelled");
    let all_day = event.start.as_ref().is_some_and(|s| s.date.is_some());

    let start = event
        .start
        .as_ref()
        .and_then(|s| s.date_time.clone().or_else(|| s.date.clone()))
        .unwrap_or_default();
    let end = event.end.as_ref().and_then(|e| e.date_time.clone().or_else(|| e.date.clone()));

    let out_of_office = event.event_type.as_deref() == Some("outOfOffice")
        || event.transparency.as_deref() == Some("transparent");

    let updated_ts = event
        .updated
        .as_deref()
        .and_then(|u| DateTime::parse_from_rfc3339(u).ok())
        .map(|dt| dt.with_timezone(&Utc).timestamp());

    RemoteEvent {
        id: event.id,
        summary: event.summary.filter(|s| !s.trim().is_empty()),
        description: event.description,
        start,
        end,
        all_day,
        cancelled,
        out_of_office,
        updated_ts,
    }
}

/// Build the insert/patch payload. All-day events use exclusive end dates,
/// timed events UTC datetimes.
fn event_body(draft: &RemoteEventDraft) -> serde_json::Value {
    if draft.all_day {
        let start_date = ts_to_date(draft.start_ts);
        let end_exclusive = ts_to_date(draft.end_ts.max(draft.start_ts))
            .checked_add_days(Days::new(1))
            .unwrap_or(start_date);
        serde_json::json!({
            "summary": draft.summary,
            "description": draft.description,
            "start": { "date": start_date.format("%Y-%m-%d").to_string() },
            "end": { "date": end_exclusive.format("%Y-%m-%d").to_string() },
        })
    } else {
        serde_json::json!({
            "summary": draft.summary,
            "description": draft.description,
            "start": { "dateTime": ts_to_rfc3339(draft.start_ts), "timeZone": "UTC" },
            "end": { "dateTime": ts_to_rfc3339(draft.end_ts), "timeZone": "UTC" },
        })
    }
}

fn ts_to_rfc3339(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0).unwrap_or_default().to_rfc3339()
}

fn ts_to_date(ts: i64) -> NaiveDate {
    DateTime::from_timestamp(ts, 0).unwrap_or_default().date_naive()
}

#[derive(Debug, Deserialize)]
struct GoogleEventsResponse {
    #[serde(default)]
    items: Vec<GoogleCalendarEvent>,
    #[serde(rename = "nextSyncToken")]
    next_sync_token: Option<String>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleCalendarEvent {
    id: String,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    start: Option<EventDateTime>,
    end: Option<EventDateTime>,
    updated: Option<String>,
    transparency: Option<String>,
    #[serde(rename = "eventType")]
    event_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventDateTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedEventResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WatchResponse {
    #[serde(rename = "resourceId")]
    resource_id: String,
    expiration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    expires_in: i64,
}
