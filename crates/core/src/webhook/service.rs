//! Webhook receiver service
//!
//! Validates provider push notifications against the stored channel
//! registration and manages the channel lifecycle. The actual pull run is
//! dispatched by the API layer after verification, keeping the webhook
//! response fast.

use std::sync::Arc;

use chrono::Utc;
use contendo_domain::constants::WEBHOOK_CHANNEL_TTL_SECS;
use contendo_domain::{ContendoError, Result, WebhookChannel};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::sync::ports::{CalendarProvider, SyncStateRepository};

/// What to do with a verified notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookDisposition {
    /// Initial `sync` handshake message; acknowledge and do nothing.
    Handshake,
    /// A real change notification; dispatch a pull for this tenant.
    TriggerPull { tenant_id: String },
}

/// Webhook channel service
pub struct WebhookService {
    state: Arc<dyn SyncStateRepository>,
    provider: Arc<dyn CalendarProvider>,
}

impl WebhookService {
    /// Create a new webhook service
    pub fn new(state: Arc<dyn SyncStateRepository>, provider: Arc<dyn CalendarProvider>) -> Self {
        Self { state, provider }
    }

    /// Validate an incoming notification against the stored registration.
    ///
    /// Unknown channel ids and token mismatches are `Unauthorized`; nothing
    /// is processed for them and no sync run is created.
    #[instrument(skip(self, channel_token))]
    pub async fn verify_notification(
        &self,
        channel_id: &str,
        channel_token: Option<&str>,
        resource_state: Option<&str>,
    ) -> Result<WebhookDisposition> {
        let state = self
            .state
            .find_by_channel(channel_id)
            .await?
            .ok_or_else(|| ContendoError::Unauthorized("unknown notification channel".into()))?;

        let channel = state
            .channel
            .ok_or_else(|| ContendoError::Unauthorized("channel no longer registered".into()))?;

        if channel_token != Some(channel.token.as_str()) {
            return Err(ContendoError::Unauthorized("channel token mismatch".into()));
        }

        if resource_state == Some("sync") {
            return Ok(WebhookDisposition::Handshake);
        }

        Ok(WebhookDisposition::TriggerPull { tenant_id: state.tenant_id })
    }

    /// Register a new notification channel with the provider and store it.
    #[instrument(skip(self))]
    pub async fn setup(&self, tenant_id: &str) -> Result<WebhookChannel> {
        let channel_id = Uuid::new_v4().to_string();
        let token = generate_channel_token();

        let registration = self
            .provider
            .register_channel(tenant_id, &channel_id, &token)
            .await
            .map_err(ContendoError::from)?;

        let channel = WebhookChannel {
            id: channel_id,
            resource_id: registration.resource_id,
            token,
            expiry: registration.expiry,
        };
        self.state.set_channel(tenant_id, Some(&channel)).await?;

        info!(tenant_id, channel_id = %channel.id, expiry = channel.expiry, "webhook channel registered");
        Ok(channel)
    }

    /// Deregister the channel. Provider-side failure (already expired) is
    /// logged and swallowed; local state is cleared regardless.
    #[instrument(skip(self))]
    pub async fn stop(&self, tenant_id: &str) -> Result<()> {
        let state = self.state.get_or_default(tenant_id).await?;

        if let Some(channel) = state.channel {
            if let Err(e) =
                self.provider.stop_channel(tenant_id, &channel.id, &channel.resource_id).await
            {
                warn!(tenant_id, channel_id = %channel.id, error = %e, "provider channel stop failed, clearing local registration anyway");
            }
        }

        self.state.set_channel(tenant_id, None).await?;
        info!(tenant_id, "webhook channel cleared");
        Ok(())
    }

    /// Expiry the next registration should ask for.
    pub fn requested_expiry() -> i64 {
        Utc::now().timestamp() + WEBHOOK_CHANNEL_TTL_SECS
    }
}

fn generate_channel_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_tokens_are_long_and_alphanumeric() {
        let token = generate_channel_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
