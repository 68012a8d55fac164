use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage provider kinds
///
/// The closed set of object-storage vendors the storage service can talk to.
/// Configuration strings are parsed into one of these; anything unrecognized is
/// resolved to [`ProviderKind::S3`] by [`ProviderKind::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "s3")]
    S3,
    #[serde(rename = "alioss")]
    AliOss,
    #[serde(rename = "tencentoss")]
    TencentCos,
}

impl ProviderKind {
    /// Configuration identifier (`STORAGE_PROVIDER` value)
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::S3 => "s3",
            ProviderKind::AliOss => "alioss",
            ProviderKind::TencentCos => "tencentoss",
        }
    }

    /// Human-readable vendor name used in error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::S3 => "S3",
            ProviderKind::AliOss => "Ali OSS",
            ProviderKind::TencentCos => "Tencent COS",
        }
    }

    /// Parse a configured provider, falling back to S3 for unknown values.
    ///
    /// Returns the resolved kind and whether the fallback was taken.
    pub fn resolve(configured: &str) -> (ProviderKind, bool) {
        match configured.parse() {
            Ok(kind) => (kind, false),
            Err(_) => (ProviderKind::S3, true),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(ProviderKind::S3),
            "alioss" => Ok(ProviderKind::AliOss),
            "tencentoss" => Ok(ProviderKind::TencentCos),
            _ => Err(anyhow::anyhow!("Invalid storage provider: {}", s)),
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
