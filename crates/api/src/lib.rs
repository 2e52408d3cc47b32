//! # Contendo API
//!
//! Axum REST surface over the calendar core: import sessions, OCR preview,
//! sync triggers, and the provider webhook receiver.

pub mod auth;
pub mod context;
pub mod error;
pub mod handlers;
pub mod routes;

pub use context::AppContext;
pub use routes::build_router;
