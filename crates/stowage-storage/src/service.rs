//! Storage service: the single entry point used by the HTTP layer.
//!
//! Validates uploads, then delegates to the provider chosen at startup. Streamed
//! multipart uploads are staged to disk first so the provider gets a plain,
//! re-readable file stream.

use crate::factory::create_provider;
use crate::staging::{self, BodyReadError, StagedFile};
use crate::validator::{FileValidator, ValidationError};
use crate::{ProviderKind, StorageError, StorageProvider, StorageResult};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stowage_core::{FileUploadOptions, StorageConfig, UploadedFileResult};
use thiserror::Error;
use tokio::io::AsyncRead;

/// Signed URL lifetime when the caller does not ask for one
pub const DEFAULT_URL_EXPIRY_SECS: u64 = 3600;

/// Upload failures: rejected by validation, or failed in staging / at the vendor.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The client's body broke off or was malformed while it was being staged.
    #[error(transparent)]
    Request(#[from] BodyReadError),
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::Storage(StorageError::Staging(err))
    }
}

/// In-memory upload
#[derive(Debug, Clone)]
pub struct BufferedUpload {
    pub data: Bytes,
    pub originalname: String,
    pub mimetype: String,
    pub size: u64,
}

/// Streamed upload as handed over by the multipart decoder
pub struct MultipartUpload<R> {
    pub filename: String,
    pub mimetype: String,
    /// Declared size, if the client sent one
    pub size: Option<u64>,
    pub reader: R,
}

#[derive(Clone)]
pub struct StorageService {
    provider: Arc<dyn StorageProvider>,
    validator: FileValidator,
    tmp_dir: PathBuf,
}

impl StorageService {
    /// Build the service and its provider from configuration.
    pub async fn new(config: &StorageConfig) -> StorageResult<Self> {
        let provider = create_provider(config).await?;
        Ok(Self::with_provider(provider, config))
    }

    /// Build the service around an existing provider.
    pub fn with_provider(provider: Arc<dyn StorageProvider>, config: &StorageConfig) -> Self {
        Self {
            provider,
            validator: FileValidator::new(
                config.max_file_size,
                config.allowed_mime_types.clone(),
            ),
            tmp_dir: config.tmp_dir.clone(),
        }
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.provider_kind()
    }

    pub fn max_file_size(&self) -> u64 {
        self.validator.max_file_size()
    }

    pub fn allowed_mime_types(&self) -> &[String] {
        self.validator.allowed_mime_types()
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    pub async fn upload_file(&self, file: BufferedUpload) -> Result<UploadedFileResult, UploadError> {
        self.validator.validate(file.size, &file.mimetype)?;

        let options = FileUploadOptions::default().with_content_type(file.mimetype);
        Ok(self
            .provider
            .upload_file(file.data, &file.originalname, &options)
            .await?)
    }

    /// Stage a streamed upload to disk, then hand it to the provider's stream path.
    ///
    /// The staging file is removed on every exit path.
    pub async fn upload_multipart_file<R>(
        &self,
        file: MultipartUpload<R>,
    ) -> Result<UploadedFileResult, UploadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let MultipartUpload {
            filename,
            mimetype,
            size,
            mut reader,
        } = file;

        self.validator.validate(size.unwrap_or(0), &mimetype)?;

        let (staged, out) = StagedFile::create(&self.tmp_dir, &filename).await?;
        let result = self
            .stage_and_upload(&staged, out, &mut reader, &filename, mimetype)
            .await;
        staged.remove().await;

        result
    }

    async fn stage_and_upload<R>(
        &self,
        staged: &StagedFile,
        mut out: tokio::fs::File,
        reader: &mut R,
        filename: &str,
        mimetype: String,
    ) -> Result<UploadedFileResult, UploadError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let start = Instant::now();
        let written = staging::drain_into(reader, &mut out, |total| {
            self.validator
                .check_size(total)
                .map_err(UploadError::from)
        })
        .await?;
        drop(out);

        tracing::debug!(
            path = %staged.path().display(),
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload staged"
        );

        let staged_reader = staged.open().await?;
        let options = FileUploadOptions::default().with_content_type(mimetype);
        Ok(self
            .provider
            .upload_file_from_stream(Box::pin(staged_reader), Some(written), filename, &options)
            .await?)
    }

    pub async fn delete_file(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        self.provider.delete_file(key).await
    }

    /// Signed URL for `key`, valid for `expires_in` seconds (default one hour).
    pub async fn get_file_url(&self, key: &str, expires_in: Option<u64>) -> StorageResult<String> {
        validate_key(key)?;
        let expires_in = Duration::from_secs(expires_in.unwrap_or(DEFAULT_URL_EXPIRY_SECS));
        self.provider.get_file_url(key, expires_in).await
    }
}

/// Keys are relative, non-empty and free of `..` segments.
fn validate_key(key: &str) -> StorageResult<()> {
    if key.trim().is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".to_string()));
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
