use crate::keys::generate_key;
use crate::traits::{StorageError, StorageProvider, StorageResult, UploadReader};
use crate::ProviderKind;
use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use stowage_core::models::{normalize_etag, UNKNOWN_SIZE};
use stowage_core::{FileUploadOptions, StorageConfig, UploadedFileResult};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Multipart part size (S3 minimum for every part but the last)
const PART_SIZE: usize = 5 * 1024 * 1024;

const KIND: ProviderKind = ProviderKind::S3;

/// S3-compatible storage provider (AWS S3, MinIO, other S3 APIs)
#[derive(Clone)]
pub struct S3Provider {
    client: Client,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    base_url: Option<String>,
}

impl S3Provider {
    /// Create a new S3 provider
    ///
    /// Explicit credentials from the config are used when both the key id and the
    /// secret are set; otherwise the default AWS credential chain is loaded.
    /// A custom endpoint (e.g. "http://localhost:9000" for MinIO) switches the
    /// client to path-style addressing.
    pub async fn new(config: &StorageConfig) -> StorageResult<Self> {
        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key_id, &config.access_key_secret) {
            (Some(key_id), Some(secret)) => aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(Credentials::new(
                    key_id,
                    secret,
                    None,
                    None,
                    "stowage-config",
                )),
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        // Retry policy belongs to the caller
        builder = builder.retry_config(RetryConfig::disabled());

        let endpoint_url = config.endpoint.as_deref().map(with_scheme);
        if let Some(ref endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(S3Provider {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint_url,
            base_url: config.base_url.clone(),
        })
    }

    fn metadata(options: &FileUploadOptions) -> Option<HashMap<String, String>> {
        if options.metadata.is_empty() {
            None
        } else {
            Some(
                options
                    .metadata
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )
        }
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        options: &FileUploadOptions,
    ) -> StorageResult<Option<String>> {
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(options.content_type_or_default())
            .acl(ObjectCannedAcl::from(options.acl_or_default().as_str()))
            .set_metadata(Self::metadata(options))
            .send()
            .await
            .map_err(|e| StorageError::upload(KIND, DisplayErrorContext(&e)))?;

        Ok(output.e_tag().and_then(normalize_etag))
    }

    /// Multipart upload starting with an already-read first part.
    async fn multipart_upload(
        &self,
        key: &str,
        first_part: Vec<u8>,
        reader: &mut UploadReader,
        options: &FileUploadOptions,
    ) -> StorageResult<(Option<String>, u64, i32)> {
        let create = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(options.content_type_or_default())
            .acl(ObjectCannedAcl::from(options.acl_or_default().as_str()))
            .set_metadata(Self::metadata(options))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to create multipart upload"
                );
                StorageError::upload(KIND, DisplayErrorContext(&e))
            })?;

        let upload_id = create
            .upload_id()
            .ok_or_else(|| StorageError::upload(KIND, "No upload ID returned from S3"))?
            .to_string();

        match self
            .upload_parts(key, &upload_id, first_part, reader)
            .await
        {
            Ok(done) => Ok(done),
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        error = %DisplayErrorContext(&abort_err),
                        bucket = %self.bucket,
                        key = %key,
                        upload_id = %upload_id,
                        "Failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        first_part: Vec<u8>,
        reader: &mut UploadReader,
    ) -> StorageResult<(Option<String>, u64, i32)> {
        let mut parts = Vec::new();
        let mut part_number = 1i32;
        let mut total_size = 0u64;
        let mut part = first_part;

        loop {
            total_size += part.len() as u64;
            let full = part.len() == PART_SIZE;

            let output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(part))
                .send()
                .await
                .map_err(|e| {
                    tracing::error!(
                        error = %DisplayErrorContext(&e),
                        bucket = %self.bucket,
                        key = %key,
                        part_number = part_number,
                        "Failed to upload part"
                    );
                    StorageError::upload(KIND, DisplayErrorContext(&e))
                })?;

            let etag = output.e_tag().ok_or_else(|| {
                StorageError::upload(KIND, format!("No ETag returned for part {}", part_number))
            })?;

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(etag)
                    .build(),
            );

            if !full {
                break;
            }

            part = read_part(reader).await?;
            if part.is_empty() {
                break;
            }
            part_number += 1;
        }

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to complete multipart upload"
                );
                StorageError::upload(KIND, DisplayErrorContext(&e))
            })?;

        Ok((output.e_tag().and_then(normalize_etag), total_size, part_number))
    }
}

#[async_trait]
impl StorageProvider for S3Provider {
    async fn upload_file(
        &self,
        data: Bytes,
        filename: &str,
        options: &FileUploadOptions,
    ) -> StorageResult<UploadedFileResult> {
        let key = generate_key(filename);
        let size = data.len();
        let start = Instant::now();

        let etag = self
            .put_object(&key, data, options)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(UploadedFileResult {
            url: self.public_url(&key),
            key,
            etag,
            size: size as i64,
            mimetype: options.content_type_or_default().to_string(),
            originalname: filename.to_string(),
        })
    }

    async fn upload_file_from_stream(
        &self,
        mut reader: UploadReader,
        _content_length: Option<u64>,
        filename: &str,
        options: &FileUploadOptions,
    ) -> StorageResult<UploadedFileResult> {
        let key = generate_key(filename);
        let start = Instant::now();

        // One part's worth decides between a single PUT and a multipart upload
        let first_part = read_part(&mut reader).await?;

        let etag = if first_part.len() < PART_SIZE {
            let size = first_part.len();
            let etag = self
                .put_object(&key, Bytes::from(first_part), options)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        error = %e,
                        bucket = %self.bucket,
                        key = %key,
                        size_bytes = size,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 stream upload failed"
                    );
                })?;

            tracing::info!(
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 stream upload successful"
            );
            etag
        } else {
            let (etag, total_size, parts) = self
                .multipart_upload(&key, first_part, &mut reader, options)
                .await?;

            tracing::info!(
                bucket = %self.bucket,
                key = %key,
                size_bytes = total_size,
                parts = parts,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 multipart stream upload successful"
            );
            etag
        };

        Ok(UploadedFileResult {
            url: self.public_url(&key),
            key,
            etag,
            size: UNKNOWN_SIZE,
            mimetype: options.content_type_or_default().to_string(),
            originalname: filename.to_string(),
        })
    }

    async fn delete_file(&self, key: &str) -> StorageResult<bool> {
        let start = Instant::now();

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                StorageError::delete(KIND, DisplayErrorContext(&e))
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(true)
    }

    async fn get_file_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presigning_config =
            PresigningConfig::expires_in(expires_in).map_err(|e| StorageError::sign(KIND, e))?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| StorageError::sign(KIND, DisplayErrorContext(&e)))?;

        Ok(presigned_request.uri().to_string())
    }

    fn provider_kind(&self) -> ProviderKind {
        KIND
    }

    /// `{base_url}/{key}` when configured; otherwise path-style on a custom
    /// endpoint or the AWS virtual-hosted domain.
    fn public_url(&self, key: &str) -> String {
        if let Some(ref base_url) = self.base_url {
            format!("{}/{}", base_url.trim_end_matches('/'), key)
        } else if let Some(ref endpoint) = self.endpoint_url {
            format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            )
        }
    }
}

/// Read up to one part from the reader; shorter only at EOF.
async fn read_part<R>(reader: &mut R) -> StorageResult<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; PART_SIZE];
    let mut filled = 0usize;

    while filled < PART_SIZE {
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|e| StorageError::upload(KIND, format!("Failed to read from stream: {}", e)))?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    buf.truncate(filled);
    Ok(buf)
}

fn with_scheme(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", endpoint.trim_end_matches('/'))
    }
}
