//! Provider webhook channel handling

mod service;

pub use service::{WebhookDisposition, WebhookService};
