//! # Contendo Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The Import Session Manager and OCR pipeline orchestration
//! - The External Calendar Sync Engine and Webhook service
//! - Port/adapter interfaces (traits)
//!
//! ## Architecture Principles
//! - Only depends on `contendo-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod import;
pub mod sync;
pub mod webhook;

// Re-export specific items to avoid ambiguity
pub use import::ports::{
    EmployeeDirectory, EventStore, ExtractedDocument, ImportBatchRepository, OcrExtractor,
};
pub use import::{ConfirmOutcome, ImportService};
pub use sync::errors::{SyncError, SyncErrorCategory, SyncResult};
pub use sync::ports::{
    CalendarProvider, ChannelRegistration, FetchCursor, RemoteEvent, RemoteEventDraft, RemotePage,
    SyncRunRepository, SyncStateRepository,
};
pub use sync::{SyncEngine, SyncEngineConfig};
pub use webhook::{WebhookDisposition, WebhookService};
