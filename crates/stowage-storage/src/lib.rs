//! Stowage Storage Library
//!
//! This crate provides the storage provider abstraction, its three implementations
//! (S3-compatible, Ali OSS, Tencent COS) and the `StorageService` that validates
//! uploads and delegates to the configured provider.
//!
//! # Storage key format
//!
//! Keys are always generated server-side as `{yyyy}/{mm}/{dd}/{uuid-v4}{ext}`, where
//! `ext` is the extension of the caller's filename. Key generation is centralized in
//! the `keys` module so all providers produce identical keys.

pub mod alioss;
pub mod factory;
pub mod keys;
mod rest;
pub mod s3;
pub mod service;
pub mod staging;
pub mod tencent_cos;
pub mod traits;
pub mod validator;

// Re-export commonly used types
pub use alioss::AliOssProvider;
pub use factory::create_provider;
pub use s3::S3Provider;
pub use staging::BodyReadError;
pub use service::{BufferedUpload, MultipartUpload, StorageService, UploadError};
pub use stowage_core::ProviderKind;
pub use tencent_cos::TencentCosProvider;
pub use traits::{StorageError, StorageProvider, StorageResult, UploadReader};
pub use validator::{FileValidator, ValidationError};
