//! SQLite persistence layer
//!
//! Repositories implementing the core ports on top of a pooled rusqlite
//! connection. Multi-row operations run inside explicit transactions.

mod employee_directory;
mod event_store;
mod import_batch_repository;
mod manager;
mod module_flags_repository;
mod sync_run_repository;
mod sync_state_repository;

pub use employee_directory::SqliteEmployeeDirectory;
pub use event_store::SqliteEventStore;
pub use import_batch_repository::SqliteImportBatchRepository;
pub use manager::{DbConnection, DbManager, DbPool};
pub use module_flags_repository::{ModuleFlags, SqliteModuleFlags};
pub use sync_run_repository::SqliteSyncRunRepository;
pub use sync_state_repository::SqliteSyncStateRepository;
