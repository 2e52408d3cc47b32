//! Import session management
//!
//! Everything between an uploaded schedule document and durable calendar
//! events: OCR preview, reparse, atomic confirm, diff, and reversible undo.

pub mod diff;
pub mod ports;
mod service;

pub use service::{ConfirmOutcome, ImportService};
