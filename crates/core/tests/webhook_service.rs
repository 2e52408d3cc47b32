//! Integration tests for the webhook channel service

mod support;

use contendo_core::{WebhookDisposition, WebhookService};
use contendo_domain::{ContendoError, SyncState, WebhookChannel};
use support::{InMemoryStateRepository, MockProvider};

fn registered_state(tenant_id: &str) -> SyncState {
    let mut state = SyncState::disconnected(tenant_id, 0);
    state.connected = true;
    state.enabled = true;
    state.channel = Some(WebhookChannel {
        id: "chan-1".to_string(),
        resource_id: "res-1".to_string(),
        token: "secret-token".to_string(),
        expiry: 2_000_000_000,
    });
    state
}

#[tokio::test]
async fn unknown_channel_is_unauthorized() {
    let state = InMemoryStateRepository::new();
    let service = WebhookService::new(state, MockProvider::new());

    let err = service
        .verify_notification("no-such-channel", Some("secret-token"), Some("exists"))
        .await
        .unwrap_err();
    assert!(matches!(err, ContendoError::Unauthorized(_)));
}

#[tokio::test]
async fn token_mismatch_is_unauthorized() {
    let state = InMemoryStateRepository::new();
    state.set(registered_state("t1"));
    let service = WebhookService::new(state, MockProvider::new());

    let err = service
        .verify_notification("chan-1", Some("wrong-token"), Some("exists"))
        .await
        .unwrap_err();
    assert!(matches!(err, ContendoError::Unauthorized(_)));

    let err = service.verify_notification("chan-1", None, Some("exists")).await.unwrap_err();
    assert!(matches!(err, ContendoError::Unauthorized(_)));
}

#[tokio::test]
async fn handshake_is_acknowledged_without_a_pull() {
    let state = InMemoryStateRepository::new();
    state.set(registered_state("t1"));
    let service = WebhookService::new(state, MockProvider::new());

    let disposition =
        service.verify_notification("chan-1", Some("secret-token"), Some("sync")).await.unwrap();
    assert_eq!(disposition, WebhookDisposition::Handshake);
}

#[tokio::test]
async fn change_notification_triggers_a_pull_for_the_channel_tenant() {
    let state = InMemoryStateRepository::new();
    state.set(registered_state("t1"));
    let service = WebhookService::new(state, MockProvider::new());

    let disposition =
        service.verify_notification("chan-1", Some("secret-token"), Some("exists")).await.unwrap();
    assert_eq!(disposition, WebhookDisposition::TriggerPull { tenant_id: "t1".to_string() });
}

#[tokio::test]
async fn setup_registers_and_stores_the_channel() {
    let state = InMemoryStateRepository::new();
    let service = WebhookService::new(state.clone(), MockProvider::new());

    let channel = service.setup("t1").await.unwrap();

    assert!(!channel.token.is_empty());
    assert_eq!(channel.resource_id, format!("res-{}", channel.id));
    let stored = state.snapshot("t1").unwrap().channel.unwrap();
    assert_eq!(stored, channel);
}

#[tokio::test]
async fn stop_swallows_provider_failure_and_clears_state() {
    let state = InMemoryStateRepository::new();
    state.set(registered_state("t1"));
    let provider = MockProvider::new();
    *provider.stop_fails.lock() = true;
    let service = WebhookService::new(state.clone(), provider);

    service.stop("t1").await.unwrap();

    assert!(state.snapshot("t1").unwrap().channel.is_none());
}

#[tokio::test]
async fn stop_without_a_channel_is_a_no_op() {
    let state = InMemoryStateRepository::new();
    let service = WebhookService::new(state.clone(), MockProvider::new());

    service.stop("t1").await.unwrap();
    assert!(state.snapshot("t1").unwrap().channel.is_none());
}
