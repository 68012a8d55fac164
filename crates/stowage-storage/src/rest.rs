//! Shared plumbing for the REST providers (Ali OSS, Tencent COS): HTTP client,
//! request signing primitives, key encoding and vendor error decoding.

use crate::traits::{StorageError, StorageResult, UploadReader};
use crate::ProviderKind;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::StatusCode;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::fmt;
use std::time::Duration;
use tokio_util::io::ReaderStream;

/// Client-side timeout for every vendor request
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// RFC 3986 unreserved characters stay as-is
pub(crate) const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`UNRESERVED`] but keeps `/` so keys stay path-like
const KEY_PATH: &AsciiSet = &UNRESERVED.remove(b'/');

pub(crate) fn build_client(kind: ProviderKind) -> StorageResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| {
            StorageError::Config(format!(
                "Failed to build {} HTTP client: {}",
                kind.display_name(),
                e
            ))
        })
}

/// Credentials are mandatory for the REST providers.
pub(crate) fn require_credentials(
    kind: ProviderKind,
    key_id: &Option<String>,
    secret: &Option<String>,
) -> StorageResult<(String, String)> {
    match (key_id, secret) {
        (Some(id), Some(secret)) => Ok((id.clone(), secret.clone())),
        _ => Err(StorageError::Config(format!(
            "{} requires STORAGE_ACCESS_KEY_ID and STORAGE_ACCESS_KEY_SECRET",
            kind.display_name()
        ))),
    }
}

/// Endpoint given with an explicit scheme, used verbatim as the request origin.
pub(crate) fn explicit_origin(endpoint: Option<&str>) -> Option<String> {
    endpoint
        .filter(|e| e.starts_with("http://") || e.starts_with("https://"))
        .map(|e| e.trim_end_matches('/').to_string())
}

pub(crate) fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_PATH).to_string()
}

pub(crate) fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

pub(crate) fn hmac_sha1(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub(crate) fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Request body that streams the reader without buffering it.
pub(crate) fn stream_body(reader: UploadReader) -> reqwest::Body {
    reqwest::Body::wrap_stream(ReaderStream::new(reader))
}

pub(crate) fn response_etag(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .and_then(stowage_core::models::normalize_etag)
}

/// Error body shared by OSS and COS: `<Error><Code>..</Code><Message>..</Message></Error>`
#[derive(Debug, Deserialize)]
struct VendorError {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message")]
    message: Option<String>,
}

/// Decoded non-success vendor response.
#[derive(Debug)]
pub(crate) struct ErrorReply {
    status: StatusCode,
    code: Option<String>,
    message: Option<String>,
}

impl ErrorReply {
    pub(crate) async fn read(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::parse(status, &body)
    }

    pub(crate) fn parse(status: StatusCode, body: &str) -> Self {
        match quick_xml::de::from_str::<VendorError>(body) {
            Ok(err) => Self {
                status,
                code: Some(err.code),
                message: err.message,
            },
            Err(_) => Self {
                status,
                code: None,
                message: None,
            },
        }
    }

    pub(crate) fn status(&self) -> StatusCode {
        self.status
    }

    /// Vendor error code, e.g. `NoSuchKey`
    pub(crate) fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => {
                write!(f, "{} ({}): {}", code, self.status.as_u16(), message)
            }
            (Some(code), None) => write!(f, "{} ({})", code, self.status.as_u16()),
            _ => write!(f, "HTTP {}", self.status),
        }
    }
}

/// Turn a non-success vendor response into a readable message.
pub(crate) async fn error_message(response: reqwest::Response) -> String {
    ErrorReply::read(response).await.to_string()
}

/// Unix timestamp `expires_in` from `now`, rejecting values past `i64::MAX`.
pub(crate) fn expiry_timestamp(
    kind: ProviderKind,
    now: i64,
    expires_in: Duration,
) -> StorageResult<i64> {
    i64::try_from(expires_in.as_secs())
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| StorageError::sign(kind, "Expiry is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sha1_rfc2202_case_1() {
        let mac = hmac_sha1(&[0x0b; 20], b"Hi There");
        assert_eq!(hex::encode(mac), "b617318655057264e28bc0b6fb378c8ef146be00");
    }

    #[test]
    fn test_sha1_hex() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_encode_key_keeps_slashes() {
        assert_eq!(
            encode_key("2024/01/02/my file+1.png"),
            "2024/01/02/my%20file%2B1.png"
        );
        assert_eq!(encode_component("1;2"), "1%3B2");
    }

    #[test]
    fn test_explicit_origin() {
        assert_eq!(
            explicit_origin(Some("http://127.0.0.1:9000/")),
            Some("http://127.0.0.1:9000".to_string())
        );
        assert_eq!(explicit_origin(Some("oss-cn-hangzhou.aliyuncs.com")), None);
        assert_eq!(explicit_origin(None), None);
    }

    #[test]
    fn test_error_reply_decodes_vendor_xml() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>NoSuchBucket</Code>
  <Message>The bucket &amp; key do not exist</Message>
  <RequestId>5C3D9175B6FC201293AD4890</RequestId>
</Error>"#;
        let reply = ErrorReply::parse(StatusCode::NOT_FOUND, body);
        assert_eq!(reply.code(), Some("NoSuchBucket"));
        assert_eq!(reply.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            reply.to_string(),
            "NoSuchBucket (404): The bucket & key do not exist"
        );
    }

    #[test]
    fn test_error_reply_reads_cdata_and_missing_message() {
        let body = "<Error><Code><![CDATA[AccessDenied]]></Code></Error>";
        let reply = ErrorReply::parse(StatusCode::FORBIDDEN, body);
        assert_eq!(reply.code(), Some("AccessDenied"));
        assert_eq!(reply.to_string(), "AccessDenied (403)");
    }

    #[test]
    fn test_error_reply_without_xml_body() {
        let reply = ErrorReply::parse(StatusCode::BAD_GATEWAY, "upstream timeout");
        assert_eq!(reply.code(), None);
        assert_eq!(reply.to_string(), "HTTP 502 Bad Gateway");
    }

    #[test]
    fn test_expiry_timestamp_rejects_overflow() {
        assert_eq!(
            expiry_timestamp(ProviderKind::AliOss, 1_700_000_000, Duration::from_secs(60)).unwrap(),
            1_700_000_060
        );
        let err = expiry_timestamp(
            ProviderKind::AliOss,
            1_700_000_000,
            Duration::from_secs(i64::MAX as u64),
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::SignFailed { .. }));
        assert!(expiry_timestamp(ProviderKind::TencentCos, 0, Duration::from_secs(u64::MAX)).is_err());
    }
}
