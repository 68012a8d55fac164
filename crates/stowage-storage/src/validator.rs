//! Upload validation: size limit and MIME allow-list, checked before any I/O.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File size exceeds the limit of {limit_mb}MB")]
    FileTooLarge { size: u64, limit_mb: String },

    #[error("File type not allowed. Allowed types: {allowed}")]
    MimeTypeNotAllowed { mimetype: String, allowed: String },
}

/// Validates uploads against the configured limits.
#[derive(Debug, Clone)]
pub struct FileValidator {
    max_file_size: u64,
    allowed_mime_types: Vec<String>,
}

impl FileValidator {
    pub fn new(max_file_size: u64, allowed_mime_types: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_mime_types,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn allowed_mime_types(&self) -> &[String] {
        &self.allowed_mime_types
    }

    pub fn validate(&self, size: u64, mimetype: &str) -> Result<(), ValidationError> {
        self.check_size(size)?;

        if !self.is_allowed(mimetype) {
            return Err(ValidationError::MimeTypeNotAllowed {
                mimetype: mimetype.to_string(),
                allowed: self.allowed_mime_types.join(", "),
            });
        }

        Ok(())
    }

    /// Size check on its own, used while draining streams of undeclared length.
    pub fn check_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                limit_mb: format_megabytes(self.max_file_size),
            });
        }
        Ok(())
    }

    fn is_allowed(&self, mimetype: &str) -> bool {
        let essence = mime_essence(mimetype);
        self.allowed_mime_types
            .iter()
            .any(|allowed| mime_essence(allowed) == essence)
    }
}

/// `image/PNG; charset=x` -> `image/png`
fn mime_essence(mimetype: &str) -> String {
    mimetype
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

// 10485760 -> "10", 1572864 -> "1.5"
fn format_megabytes(bytes: u64) -> String {
    let mb = bytes as f64 / 1024.0 / 1024.0;
    format!("{}", mb)
}
