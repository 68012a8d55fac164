//! Tencent Cloud COS provider
//!
//! REST client for COS using the `q-sign-algorithm=sha1` request signature.
//! The same authorization string is sent as the `Authorization` header for API
//! calls and appended as the query string for signed GET URLs.

use crate::keys::generate_key;
use crate::rest;
use crate::traits::{StorageError, StorageProvider, StorageResult, UploadReader};
use crate::ProviderKind;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use std::time::{Duration, Instant};
use stowage_core::models::UNKNOWN_SIZE;
use stowage_core::{FileUploadOptions, StorageConfig, UploadedFileResult};

const KIND: ProviderKind = ProviderKind::TencentCos;

/// Validity window of header signatures on API calls
const REQUEST_SIGN_TTL_SECS: i64 = 900;

/// Tencent COS storage provider
#[derive(Clone)]
pub struct TencentCosProvider {
    client: reqwest::Client,
    bucket: String,
    /// `https://{bucket}.cos.{region}.myqcloud.com`, or an explicit-scheme endpoint
    origin: String,
    /// Host part of `origin`, signed on every request
    host: String,
    signer: CosSigner,
    base_url: Option<String>,
}

impl TencentCosProvider {
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let (secret_id, secret_key) = rest::require_credentials(
            KIND,
            &config.access_key_id,
            &config.access_key_secret,
        )?;

        let origin = rest::explicit_origin(config.endpoint.as_deref()).unwrap_or_else(|| {
            let host = config
                .endpoint
                .as_deref()
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("cos.{}.myqcloud.com", config.region));
            format!("https://{}.{}", config.bucket, host)
        });

        let url = reqwest::Url::parse(&origin)
            .map_err(|e| StorageError::Config(format!("Invalid COS endpoint {}: {}", origin, e)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(StorageError::Config(format!(
                    "COS endpoint {} has no host",
                    origin
                )))
            }
        };

        Ok(TencentCosProvider {
            client: rest::build_client(KIND)?,
            bucket: config.bucket.clone(),
            origin,
            host,
            signer: CosSigner {
                secret_id,
                secret_key,
            },
            base_url: config.base_url.clone(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.origin, rest::encode_key(key))
    }

    fn cos_headers(&self, options: &FileUploadOptions) -> Vec<(String, String)> {
        let mut headers = vec![
            ("host".to_string(), self.host.clone()),
            (
                "content-type".to_string(),
                options.content_type_or_default().to_string(),
            ),
            (
                "x-cos-acl".to_string(),
                options.acl_or_default().as_str().to_string(),
            ),
        ];
        for (name, value) in &options.metadata {
            headers.push((format!("x-cos-meta-{}", name.to_lowercase()), value.clone()));
        }
        headers
    }

    fn request_window() -> (i64, i64) {
        let now = Utc::now().timestamp();
        (now - 60, now + REQUEST_SIGN_TTL_SECS)
    }

    async fn put_object(
        &self,
        key: &str,
        body: reqwest::Body,
        content_length: Option<u64>,
        options: &FileUploadOptions,
    ) -> StorageResult<Option<String>> {
        let headers = self.cos_headers(options);
        let (start, end) = Self::request_window();
        let authorization =
            self.signer
                .authorization("PUT", &format!("/{}", key), &[], &headers, start, end);

        let mut request = self
            .client
            .put(self.object_url(key))
            .header(AUTHORIZATION, authorization);
        for (name, value) in headers.iter().filter(|(name, _)| name != "host") {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(len) = content_length {
            request = request.header(CONTENT_LENGTH, len);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::upload(KIND, e))?;

        if !response.status().is_success() {
            return Err(StorageError::upload(KIND, rest::error_message(response).await));
        }

        Ok(rest::response_etag(&response))
    }
}

#[async_trait]
impl StorageProvider for TencentCosProvider {
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
            .put_object(&key, data.into(), None, options)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "COS upload failed"
                );
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "COS upload successful"
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
        reader: UploadReader,
        content_length: Option<u64>,
        filename: &str,
        options: &FileUploadOptions,
    ) -> StorageResult<UploadedFileResult> {
        let key = generate_key(filename);
        let start = Instant::now();

        let etag = self
            .put_object(&key, rest::stream_body(reader), content_length, options)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "COS stream upload failed"
                );
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = content_length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "COS stream upload successful"
        );

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
        let (sign_start, sign_end) = Self::request_window();
        let headers = [("host".to_string(), self.host.clone())];
        let authorization = self.signer.authorization(
            "DELETE",
            &format!("/{}", key),
            &[],
            &headers,
            sign_start,
            sign_end,
        );

        let response = self
            .client
            .delete(self.object_url(key))
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| StorageError::delete(KIND, e))?;

        // Absent keys answer 204; a 404 only counts as deleted for NoSuchKey
        if !response.status().is_success() {
            let reply = rest::ErrorReply::read(response).await;
            let absent_key = reply.status() == reqwest::StatusCode::NOT_FOUND
                && reply.code() == Some("NoSuchKey");
            if !absent_key {
                tracing::error!(
                    error = %reply,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "COS delete failed"
                );
                return Err(StorageError::delete(KIND, reply));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "COS delete successful"
        );

        Ok(true)
    }

    async fn get_file_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let now = Utc::now().timestamp();
        let expires = rest::expiry_timestamp(KIND, now, expires_in)?;
        let headers = [("host".to_string(), self.host.clone())];
        let authorization = self.signer.authorization(
            "GET",
            &format!("/{}", key),
            &[],
            &headers,
            now,
            expires,
        );

        Ok(format!("{}?{}", self.object_url(key), authorization))
    }

    fn provider_kind(&self) -> ProviderKind {
        KIND
    }

    fn public_url(&self, key: &str) -> String {
        match self.base_url {
            Some(ref base_url) => format!("{}/{}", base_url.trim_end_matches('/'), key),
            None => format!("{}/{}", self.origin, key),
        }
    }
}

/// COS request signer (`q-sign-algorithm=sha1`)
#[derive(Clone)]
pub(crate) struct CosSigner {
    secret_id: String,
    secret_key: String,
}

impl CosSigner {
    /// Build the authorization string for a request valid in `[start, end]`.
    ///
    /// `path` is the unencoded object path (`/{key}`); `params` and `headers` are
    /// the query parameters and headers covered by the signature.
    pub(crate) fn authorization(
        &self,
        method: &str,
        path: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
        start: i64,
        end: i64,
    ) -> String {
        let key_time = format!("{};{}", start, end);
        let sign_key = hex::encode(rest::hmac_sha1(
            self.secret_key.as_bytes(),
            key_time.as_bytes(),
        ));

        let (param_list, http_parameters) = canonicalize(params);
        let (header_list, http_headers) = canonicalize(headers);

        let http_string = format!(
            "{}\n{}\n{}\n{}\n",
            method.to_lowercase(),
            path,
            http_parameters,
            http_headers
        );
        let string_to_sign = format!(
            "sha1\n{}\n{}\n",
            key_time,
            rest::sha1_hex(http_string.as_bytes())
        );
        let signature = hex::encode(rest::hmac_sha1(
            sign_key.as_bytes(),
            string_to_sign.as_bytes(),
        ));

        format!(
            "q-sign-algorithm=sha1&q-ak={}&q-sign-time={}&q-key-time={}&q-header-list={}&q-url-param-list={}&q-signature={}",
            self.secret_id, key_time, key_time, header_list, param_list, signature
        )
    }
}

/// Lowercase and encode names, encode values, sort by name.
///
/// Returns the `;`-joined name list and the `&`-joined `name=value` string.
fn canonicalize(pairs: &[(String, String)]) -> (String, String) {
    let mut encoded: Vec<(String, String)> = pairs
        .iter()
        .map(|(name, value)| {
            (
                rest::encode_component(&name.to_lowercase()),
                rest::encode_component(value),
            )
        })
        .collect();
    encoded.sort();

    let list = encoded
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let string = encoded
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&");

    (list, string)
}
