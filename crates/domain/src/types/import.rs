//! Import batch types
//!
//! An import batch holds everything an admin reviews before OCR-derived
//! events reach the Event Store: the uploaded files, the raw extracted text,
//! the parsed candidate events, and (after confirm) the undo log needed to
//! reverse the commit.

use serde::{Deserialize, Serialize};

use super::calendar::{CalendarEvent, EventKind, EventStatus};
use crate::errors::{ContendoError, Result};

/// Lifecycle of an import batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Previewed,
    Confirmed,
    Undone,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Previewed => "previewed",
            Self::Confirmed => "confirmed",
            Self::Undone => "undone",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "previewed" => Ok(Self::Previewed),
            "confirmed" => Ok(Self::Confirmed),
            "undone" => Ok(Self::Undone),
            other => Err(ContendoError::Validation(format!("unknown batch status: {other}"))),
        }
    }
}

/// Metadata of one uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportFile {
    pub name: String,
    pub size_bytes: usize,
    pub mime: String,
}

/// An uploaded file with its content, before extraction
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn descriptor(&self) -> ImportFile {
        ImportFile { name: self.name.clone(), size_bytes: self.bytes.len(), mime: self.mime.clone() }
    }
}

/// Where a candidate event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    Ocr,
    Manual,
}

/// Pointer back to the source region of a candidate event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub file_index: usize,
    pub page: u32,
    pub line: usize,
    /// Editable raw-text excerpt the candidate was parsed from.
    pub excerpt: String,
}

/// Unconfirmed, struct-shaped guess of a CalendarEvent
///
/// Dates stay as ISO strings (`YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS`) until
/// confirm, where they are validated and converted to timestamps — the admin
/// may edit them in the review UI before confirming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvent {
    pub kind: EventKind,
    pub title: String,
    pub start: String,
    pub end: Option<String>,
    pub all_day: bool,
    pub employee_name: Option<String>,
    pub status: Option<EventStatus>,
    pub confidence: f32,
    pub origin: CandidateOrigin,
    pub source: Provenance,
}

/// Version stamp of an event created by a confirm, checked during undo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedStamp {
    pub event_id: String,
    pub version: i64,
}

/// Inverse operations captured when a batch is confirmed
///
/// `created` lists events the confirm inserted (undo deletes them, provided
/// their version is untouched). `updated` and `deleted` hold the full prior
/// rows of events the confirm modified or removed (undo restores them).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UndoLog {
    pub created: Vec<CreatedStamp>,
    pub updated: Vec<CalendarEvent>,
    pub deleted: Vec<CalendarEvent>,
}

impl UndoLog {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Full import batch record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: String,
    pub tenant_id: String,
    pub files: Vec<ImportFile>,
    pub raw_text: String,
    pub items: Vec<CandidateEvent>,
    pub status: BatchStatus,
    pub undo_log: Option<UndoLog>,
    pub created_at: i64,
    pub created_by: String,
}

/// Listing row for the batch index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatchSummary {
    pub id: String,
    pub status: BatchStatus,
    pub file_count: usize,
    pub item_count: usize,
    pub created_at: i64,
    pub created_by: String,
}

/// Per-item validation failure reported by confirm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub index: usize,
    pub message: String,
}
