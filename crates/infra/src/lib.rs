//! # Contendo Infrastructure
//!
//! Adapters behind the core ports: SQLite repositories, the Google Calendar
//! provider, OCR extraction via external tools, and the configuration
//! loader.

pub mod config;
pub mod database;
pub mod errors;
pub mod integrations;
pub mod ocr;

pub use database::{
    DbManager, ModuleFlags, SqliteEmployeeDirectory, SqliteEventStore,
    SqliteImportBatchRepository, SqliteModuleFlags, SqliteSyncRunRepository,
    SqliteSyncStateRepository,
};
pub use errors::InfraError;
pub use integrations::google::GoogleCalendarProvider;
pub use ocr::TextExtractor;
