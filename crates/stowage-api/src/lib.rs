//! Stowage HTTP API
//!
//! Thin axum surface over `stowage_storage::StorageService`: multipart upload,
//! delete, signed URLs, health and the OpenAPI document.

pub mod api_doc;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;
