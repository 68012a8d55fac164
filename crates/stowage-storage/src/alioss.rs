//! Alibaba Cloud OSS provider
//!
//! Talks to the OSS REST API directly and authenticates with the OSS V1 header
//! signature (`Authorization: OSS {AccessKeyId}:{Signature}`), where the signature
//! is `base64(HMAC-SHA1(secret, StringToSign))`.

use crate::keys::generate_key;
use crate::rest;
use crate::traits::{StorageError, StorageProvider, StorageResult, UploadReader};
use crate::ProviderKind;
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use stowage_core::models::UNKNOWN_SIZE;
use stowage_core::{FileUploadOptions, StorageConfig, UploadedFileResult};

const KIND: ProviderKind = ProviderKind::AliOss;

/// Ali OSS storage provider
#[derive(Clone)]
pub struct AliOssProvider {
    client: reqwest::Client,
    bucket: String,
    /// `https://{bucket}.{endpoint}`, or an explicit-scheme endpoint as given
    origin: String,
    access_key_id: String,
    access_key_secret: String,
    base_url: Option<String>,
}

impl AliOssProvider {
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let (access_key_id, access_key_secret) = rest::require_credentials(
            KIND,
            &config.access_key_id,
            &config.access_key_secret,
        )?;

        let origin = rest::explicit_origin(config.endpoint.as_deref()).unwrap_or_else(|| {
            format!("https://{}.{}", config.bucket, Self::endpoint_host(config))
        });

        Ok(AliOssProvider {
            client: rest::build_client(KIND)?,
            bucket: config.bucket.clone(),
            origin,
            access_key_id,
            access_key_secret,
            base_url: config.base_url.clone(),
        })
    }

    /// Configured endpoint, or `oss-{region}.aliyuncs.com`
    fn endpoint_host(config: &StorageConfig) -> String {
        match config.endpoint {
            Some(ref endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "oss-{}.aliyuncs.com",
                config.region.trim_start_matches("oss-")
            ),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.origin, rest::encode_key(key))
    }

    fn resource(&self, key: &str) -> String {
        format!("/{}/{}", self.bucket, key)
    }

    fn oss_headers(options: &FileUploadOptions) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert(
            "x-oss-object-acl".to_string(),
            options.acl_or_default().as_str().to_string(),
        );
        for (name, value) in &options.metadata {
            headers.insert(format!("x-oss-meta-{}", name.to_lowercase()), value.clone());
        }
        headers
    }

    fn authorization(&self, string_to_sign: &str) -> String {
        format!(
            "OSS {}:{}",
            self.access_key_id,
            signature(&self.access_key_secret, string_to_sign)
        )
    }

    async fn put_object(
        &self,
        key: &str,
        body: reqwest::Body,
        content_length: Option<u64>,
        options: &FileUploadOptions,
    ) -> StorageResult<Option<String>> {
        let content_type = options.content_type_or_default();
        let date = http_date();
        let oss_headers = Self::oss_headers(options);
        let to_sign = string_to_sign(
            "PUT",
            "",
            content_type,
            &date,
            &oss_headers,
            &self.resource(key),
        );

        let mut request = self
            .client
            .put(self.object_url(key))
            .header(DATE, &date)
            .header(CONTENT_TYPE, content_type)
            .header(AUTHORIZATION, self.authorization(&to_sign));
        for (name, value) in &oss_headers {
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
impl StorageProvider for AliOssProvider {
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
                    "OSS upload failed"
                );
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "OSS upload successful"
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
                    "OSS stream upload failed"
                );
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = content_length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "OSS stream upload successful"
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
        let date = http_date();
        let to_sign = string_to_sign("DELETE", "", "", &date, &BTreeMap::new(), &self.resource(key));

        let response = self
            .client
            .delete(self.object_url(key))
            .header(DATE, &date)
            .header(AUTHORIZATION, self.authorization(&to_sign))
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
                    "OSS delete failed"
                );
                return Err(StorageError::delete(KIND, reply));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "OSS delete successful"
        );

        Ok(true)
    }

    async fn get_file_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let expires = rest::expiry_timestamp(KIND, Utc::now().timestamp(), expires_in)?;

        let to_sign = format!("GET\n\n\n{}\n{}", expires, self.resource(key));
        let signature = signature(&self.access_key_secret, &to_sign);

        Ok(format!(
            "{}?OSSAccessKeyId={}&Expires={}&Signature={}",
            self.object_url(key),
            rest::encode_component(&self.access_key_id),
            expires,
            rest::encode_component(&signature)
        ))
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

/// OSS V1 string to sign:
/// `VERB\nContent-MD5\nContent-Type\nDate\n{CanonicalizedOSSHeaders}{CanonicalizedResource}`
pub(crate) fn string_to_sign(
    verb: &str,
    content_md5: &str,
    content_type: &str,
    date: &str,
    oss_headers: &BTreeMap<String, String>,
    resource: &str,
) -> String {
    let mut sorted: Vec<(String, &str)> = oss_headers
        .iter()
        .map(|(name, value)| (name.to_lowercase(), value.trim()))
        .collect();
    sorted.sort();

    let mut canonical_headers = String::new();
    for (name, value) in sorted {
        canonical_headers.push_str(&name);
        canonical_headers.push(':');
        canonical_headers.push_str(value);
        canonical_headers.push('\n');
    }

    format!(
        "{}\n{}\n{}\n{}\n{}{}",
        verb, content_md5, content_type, date, canonical_headers, resource
    )
}

pub(crate) fn signature(secret: &str, string_to_sign: &str) -> String {
    base64::engine::general_purpose::STANDARD
        .encode(rest::hmac_sha1(secret.as_bytes(), string_to_sign.as_bytes()))
}

fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use stowage_core::ObjectAcl;

    fn config(endpoint: Option<String>) -> StorageConfig {
        let mut config = StorageConfig::new("alioss", "oss-example");
        config.region = "cn-hangzhou".to_string();
        config.endpoint = endpoint;
        config.access_key_id = Some("44CF9590006BF252F707".to_string());
        config.access_key_secret = Some("OtxrzxIsfpFjA7SwPzILwy8Bw21TLhquhboDYROV".to_string());
        config
    }

    #[test]
    fn test_signature_matches_documented_example() {
        let mut headers = BTreeMap::new();
        headers.insert("X-OSS-Magic".to_string(), "abracadabra".to_string());
        headers.insert("X-OSS-Meta-Author".to_string(), "foo@example.com".to_string());

        let to_sign = string_to_sign(
            "PUT",
            "ODBGOERFMDMzQTczRUY3NUE3NzA5QzdFNUYzMDQxNEM=",
            "text/html",
            "Thu, 17 Nov 2005 18:49:58 GMT",
            &headers,
            "/oss-example/nelson",
        );
        assert_eq!(
            to_sign,
            "PUT\nODBGOERFMDMzQTczRUY3NUE3NzA5QzdFNUYzMDQxNEM=\ntext/html\n\
             Thu, 17 Nov 2005 18:49:58 GMT\nx-oss-magic:abracadabra\n\
             x-oss-meta-author:foo@example.com\n/oss-example/nelson"
        );
        assert_eq!(
            signature("OtxrzxIsfpFjA7SwPzILwy8Bw21TLhquhboDYROV", &to_sign),
            "26NBxoKdsyly4EDv6inkoDft/yA="
        );
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let mut config = config(None);
        config.access_key_secret = None;
        assert!(matches!(
            AliOssProvider::new(&config),
            Err(StorageError::Config(_))
        ));
    }

    #[test]
    fn test_default_public_url() {
        let oss = AliOssProvider::new(&config(None)).unwrap();
        assert_eq!(
            oss.public_url("2024/01/02/a.png"),
            "https://oss-example.oss-cn-hangzhou.aliyuncs.com/2024/01/02/a.png"
        );

        let custom = AliOssProvider::new(&config(Some("oss-accelerate.aliyuncs.com".to_string())))
            .unwrap();
        assert_eq!(
            custom.public_url("k.png"),
            "https://oss-example.oss-accelerate.aliyuncs.com/k.png"
        );

        let mut with_cdn = config(None);
        with_cdn.base_url = Some("https://cdn.example.com".to_string());
        let cdn = AliOssProvider::new(&with_cdn).unwrap();
        assert_eq!(cdn.public_url("k.png"), "https://cdn.example.com/k.png");
    }

    #[test]
    fn test_region_with_oss_prefix_is_not_doubled() {
        let mut config = config(None);
        config.region = "oss-cn-beijing".to_string();
        assert_eq!(
            AliOssProvider::endpoint_host(&config),
            "oss-cn-beijing.aliyuncs.com"
        );
    }

    #[tokio::test]
    async fn test_upload_sends_acl_metadata_and_signature() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", Matcher::Regex(r"^/\d{4}/\d{2}/\d{2}/[0-9a-f-]{36}\.pdf".to_string()))
            .match_header("x-oss-object-acl", "public-read")
            .match_header("x-oss-meta-owner", "alice")
            .match_header("content-type", "application/pdf")
            .match_header(
                "authorization",
                Matcher::Regex(r"^OSS 44CF9590006BF252F707:[A-Za-z0-9+/]{27}=$".to_string()),
            )
            .match_header("date", Matcher::Regex(r"GMT$".to_string()))
            .with_status(200)
            .with_header("ETag", "\"5B3C1A2E053D763E1B002CC607C5A0FE\"")
            .create_async()
            .await;

        let oss = AliOssProvider::new(&config(Some(server.url()))).unwrap();
        let options = FileUploadOptions::default()
            .with_content_type("application/pdf")
            .with_acl(ObjectAcl::PublicRead)
            .with_metadata("Owner", "alice");
        let result = oss
            .upload_file(Bytes::from_static(b"%PDF-1.4"), "report.pdf", &options)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.etag.as_deref(), Some("5B3C1A2E053D763E1B002CC607C5A0FE"));
        assert_eq!(result.size, 8);
        assert_eq!(result.url, format!("{}/{}", server.url(), result.key));
    }

    #[tokio::test]
    async fn test_stream_upload_reports_unknown_size() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", Matcher::Regex(r"^/\d{4}/".to_string()))
            .match_header("x-oss-object-acl", "private")
            .match_body("streamed-bytes")
            .with_status(200)
            .create_async()
            .await;

        let oss = AliOssProvider::new(&config(Some(server.url()))).unwrap();
        let reader: UploadReader = Box::pin(std::io::Cursor::new(b"streamed-bytes".to_vec()));
        let result = oss
            .upload_file_from_stream(reader, Some(14), "a.txt", &FileUploadOptions::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.size, -1);
        assert_eq!(result.etag, None);
    }

    #[tokio::test]
    async fn test_upload_error_carries_vendor_code() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("PUT", Matcher::Any)
            .with_status(403)
            .with_body("<Error><Code>SignatureDoesNotMatch</Code><Message>bad sig</Message></Error>")
            .create_async()
            .await;

        let oss = AliOssProvider::new(&config(Some(server.url()))).unwrap();
        let err = oss
            .upload_file(Bytes::from_static(b"x"), "a.txt", &FileUploadOptions::default())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to upload file to Ali OSS: SignatureDoesNotMatch (403): bad sig"
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        for (status, body) in [(204, ""), (404, "<Error><Code>NoSuchKey</Code></Error>")] {
            let mut server = Server::new_async().await;
            let mock = server
                .mock("DELETE", "/2024/01/02/a.png")
                .match_header("authorization", Matcher::Regex(r"^OSS ".to_string()))
                .with_status(status)
                .with_body(body)
                .create_async()
                .await;

            let oss = AliOssProvider::new(&config(Some(server.url()))).unwrap();
            assert!(oss.delete_file("2024/01/02/a.png").await.unwrap());
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_delete_failure_is_wrapped() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("DELETE", Matcher::Any)
            .with_status(403)
            .with_body("<Error><Code>AccessDenied</Code></Error>")
            .create_async()
            .await;

        let oss = AliOssProvider::new(&config(Some(server.url()))).unwrap();
        let err = oss.delete_file("k.png").await.unwrap_err();
        assert!(matches!(err, StorageError::DeleteFailed { provider: "Ali OSS", .. }));
    }

    #[tokio::test]
    async fn test_signed_url_shape() {
        let oss = AliOssProvider::new(&config(None)).unwrap();
        let url = oss
            .get_file_url("2024/01/02/a b.png", Duration::from_secs(3600))
            .await
            .unwrap();

        let re = regex::Regex::new(
            r"^https://oss-example\.oss-cn-hangzhou\.aliyuncs\.com/2024/01/02/a%20b\.png\?OSSAccessKeyId=44CF9590006BF252F707&Expires=\d+&Signature=[A-Za-z0-9%]+$",
        )
        .unwrap();
        assert!(re.is_match(&url), "{url}");
    }

    #[tokio::test]
    async fn test_delete_on_missing_bucket_fails() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("DELETE", Matcher::Any)
            .with_status(404)
            .with_body("<Error><Code>NoSuchBucket</Code><Message>The specified bucket does not exist.</Message></Error>")
            .create_async()
            .await;

        let oss = AliOssProvider::new(&config(Some(server.url()))).unwrap();
        let err = oss.delete_file("2024/01/02/a.png").await.unwrap_err();
        match err {
            StorageError::DeleteFailed { provider, message } => {
                assert_eq!(provider, "Ali OSS");
                assert!(message.starts_with("NoSuchBucket (404)"), "{message}");
            }
            other => panic!("Expected DeleteFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_signed_url_rejects_overflowing_expiry() {
        let oss = AliOssProvider::new(&config(None)).unwrap();
        let err = oss
            .get_file_url("2024/01/02/a.png", Duration::from_secs(i64::MAX as u64))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::SignFailed { provider: "Ali OSS", .. }));
    }
}
