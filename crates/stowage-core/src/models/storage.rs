//! Upload inputs and results: provider-agnostic descriptions of a stored object.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;

/// Content type used when the caller does not supply one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Size reported for stream uploads, whose length is not known up front
pub const UNKNOWN_SIZE: i64 = -1;

/// Access-control level applied to an uploaded object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectAcl {
    #[default]
    Private,
    PublicRead,
    PublicReadWrite,
}

impl ObjectAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectAcl::Private => "private",
            ObjectAcl::PublicRead => "public-read",
            ObjectAcl::PublicReadWrite => "public-read-write",
        }
    }
}

impl Display for ObjectAcl {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Optional per-upload settings passed to a storage provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileUploadOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Custom metadata, sent as vendor-prefixed headers (`x-oss-meta-*`, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<ObjectAcl>,
}

impl FileUploadOptions {
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_acl(mut self, acl: ObjectAcl) -> Self {
        self.acl = Some(acl);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Content type to send, defaulting to `application/octet-stream`
    pub fn content_type_or_default(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    pub fn acl_or_default(&self) -> ObjectAcl {
        self.acl.unwrap_or_default()
    }
}

/// Result of a successful upload.
///
/// Not persisted by the storage subsystem; callers store `key`/`url` themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadedFileResult {
    /// Server-generated object key: `{yyyy}/{mm}/{dd}/{uuid}{ext}`
    pub key: String,
    /// Public URL (configured base URL or the vendor default domain)
    pub url: String,
    /// Content fingerprint reported by the provider, quotes stripped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Byte length, or `-1` when uploaded from a stream
    pub size: i64,
    pub mimetype: String,
    /// Caller-supplied filename, kept for display only
    pub originalname: String,
}

impl UploadedFileResult {
    /// Byte length when known, `None` for the stream-upload sentinel
    pub fn known_size(&self) -> Option<u64> {
        u64::try_from(self.size).ok()
    }
}

/// Strip the surrounding double quotes vendors put around ETag values.
pub fn normalize_etag(raw: &str) -> Option<String> {
    let trimmed = raw.replace('"', "");
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
