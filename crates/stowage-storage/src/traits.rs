//! Storage provider abstraction
//!
//! This module defines the `StorageProvider` trait that every object-storage vendor
//! implementation must satisfy, together with the storage error type.

use crate::ProviderKind;
use async_trait::async_trait;
use bytes::Bytes;
use std::pin::Pin;
use std::time::Duration;
use stowage_core::{FileUploadOptions, UploadedFileResult};
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to upload file to {provider}: {message}")]
    UploadFailed {
        provider: &'static str,
        message: String,
    },

    #[error("Failed to delete file from {provider}: {message}")]
    DeleteFailed {
        provider: &'static str,
        message: String,
    },

    #[error("Failed to generate signed URL for {provider}: {message}")]
    SignFailed {
        provider: &'static str,
        message: String,
    },

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("Failed to stage upload: {0}")]
    Staging(#[from] std::io::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    pub(crate) fn upload(kind: ProviderKind, message: impl ToString) -> Self {
        StorageError::UploadFailed {
            provider: kind.display_name(),
            message: message.to_string(),
        }
    }

    pub(crate) fn delete(kind: ProviderKind, message: impl ToString) -> Self {
        StorageError::DeleteFailed {
            provider: kind.display_name(),
            message: message.to_string(),
        }
    }

    pub(crate) fn sign(kind: ProviderKind, message: impl ToString) -> Self {
        StorageError::SignFailed {
            provider: kind.display_name(),
            message: message.to_string(),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte source for stream uploads
pub type UploadReader = Pin<Box<dyn AsyncRead + Send + Sync + Unpin>>;

/// Storage provider trait
///
/// All object-storage vendors (S3-compatible, Ali OSS, Tencent COS) implement this
/// trait so the storage service can work with any of them without knowing vendor
/// details.
///
/// Providers generate the object key themselves (see [`crate::keys::generate_key`])
/// and do not re-validate size or MIME type.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Upload an in-memory payload.
    ///
    /// Applies the requested ACL (default `private`), content type and custom
    /// metadata. The returned `size` is the payload length.
    async fn upload_file(
        &self,
        data: Bytes,
        filename: &str,
        options: &FileUploadOptions,
    ) -> StorageResult<UploadedFileResult>;

    /// Upload from a reader without buffering the whole payload.
    ///
    /// The reader is consumed until EOF. `content_length` is a hint; providers
    /// that can send a sized request body use it. The returned `size` is always
    /// [`stowage_core::models::UNKNOWN_SIZE`].
    async fn upload_file_from_stream(
        &self,
        reader: UploadReader,
        content_length: Option<u64>,
        filename: &str,
        options: &FileUploadOptions,
    ) -> StorageResult<UploadedFileResult>;

    /// Delete an object. Deleting an absent key also reports `true`.
    async fn delete_file(&self, key: &str) -> StorageResult<bool>;

    /// Generate a time-limited signed GET URL.
    async fn get_file_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Which vendor this provider talks to
    fn provider_kind(&self) -> ProviderKind;

    /// Public (unsigned) URL of an object
    fn public_url(&self, key: &str) -> String;
}
