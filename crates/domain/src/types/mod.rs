//! Domain data types

pub mod calendar;
pub mod diff;
pub mod employee;
pub mod import;
pub mod sync;

pub use calendar::{CalendarEvent, CalendarEventParams, EventKind, EventStatus};
pub use diff::{BatchComparison, CandidateDiff, DiffKind};
pub use employee::Employee;
pub use import::{
    BatchStatus, CandidateEvent, CandidateOrigin, CreatedStamp, ImportBatch, ImportBatchSummary,
    ImportFile, ItemError, Provenance, UndoLog, UploadedFile,
};
pub use sync::{
    ItemFailure, SyncCounts, SyncDirection, SyncOutcome, SyncRun, SyncState, WebhookChannel,
};
