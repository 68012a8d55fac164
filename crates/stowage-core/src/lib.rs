//! Stowage Core Library
//!
//! This crate provides the configuration, shared models, provider kinds and error
//! types used by the storage subsystem and the HTTP API.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, ServerConfig, StorageConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{FileUploadOptions, ObjectAcl, UploadedFileResult};
pub use storage_types::ProviderKind;
