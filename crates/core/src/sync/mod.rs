//! External calendar synchronization
//!
//! Reconciles the Event Store against the external provider in three
//! directions, with bounded retry, run history, and per-tenant state.

pub mod errors;
pub mod ports;
mod service;

pub use service::{SyncEngine, SyncEngineConfig};
