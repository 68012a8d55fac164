//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Domain errors from the
//! storage crate convert into `HttpAppError` through the `From` impls below, so every
//! failure renders with the same status mapping, body shape and logging.

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use stowage_core::{AppError, ErrorMetadata, LogLevel};
use stowage_storage::{StorageError, UploadError, ValidationError};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorResponse {
    fn from_app_error(app_error: &AppError, with_details: bool) -> Self {
        Self {
            error: app_error.client_message(),
            details: with_details.then(|| app_error.detailed_message()),
            error_type: with_details.then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        }
    }
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from stowage-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        // Details never leave the process in production or for sensitive errors.
        let with_details = !is_production_env() && !app_error.is_sensitive();
        let body = ErrorResponse::from_app_error(app_error, with_details);

        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::UploadFailed { .. }
            | StorageError::DeleteFailed { .. }
            | StorageError::SignFailed { .. }
            | StorageError::Config(_)
            | StorageError::Staging(_) => AppError::Storage(err.to_string()),
        };
        HttpAppError(app)
    }
}

impl From<ValidationError> for HttpAppError {
    fn from(err: ValidationError) -> Self {
        let app = match err {
            ValidationError::FileTooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            ValidationError::MimeTypeNotAllowed { .. } => AppError::InvalidInput(err.to_string()),
        };
        HttpAppError(app)
    }
}

impl From<UploadError> for HttpAppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(err) => err.into(),
            UploadError::Storage(err) => err.into(),
            UploadError::Request(err) => HttpAppError(AppError::BadRequest(err.to_string())),
        }
    }
}

/// Requests that are not multipart at all.
impl From<MultipartRejection> for HttpAppError {
    fn from(rejection: MultipartRejection) -> Self {
        HttpAppError(AppError::BadRequest(format!(
            "Invalid multipart request: {}",
            rejection.body_text()
        )))
    }
}

/// Malformed multipart bodies.
impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        HttpAppError(AppError::BadRequest(format!(
            "Failed to read multipart: {}",
            err.body_text()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_storage::BodyReadError;

    #[test]
    fn test_from_storage_error_upload_failed() {
        let storage_err = StorageError::UploadFailed {
            provider: "S3",
            message: "AccessDenied".to_string(),
        };
        let HttpAppError(app_err) = storage_err.into();
        match app_err {
            AppError::Storage(msg) => {
                assert_eq!(msg, "Failed to upload file to S3: AccessDenied")
            }
            _ => panic!("Expected Storage variant"),
        }
    }

    #[test]
    fn test_from_storage_error_delete_failed_is_sensitive() {
        let storage_err = StorageError::DeleteFailed {
            provider: "Ali OSS",
            message: "timeout".to_string(),
        };
        let HttpAppError(app_err) = storage_err.into();
        assert_eq!(app_err.http_status_code(), 500);
        assert_eq!(app_err.error_code(), "STORAGE_ERROR");
        assert!(app_err.is_sensitive());
        assert_eq!(app_err.client_message(), "Failed to access storage");
    }

    #[test]
    fn test_from_storage_error_invalid_key() {
        let storage_err = StorageError::InvalidKey("../etc/passwd".to_string());
        let HttpAppError(app_err) = storage_err.into();
        match app_err {
            AppError::InvalidInput(msg) => assert_eq!(msg, "../etc/passwd"),
            _ => panic!("Expected InvalidInput variant"),
        }
    }

    #[test]
    fn test_from_storage_error_staging() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let HttpAppError(app_err) = StorageError::Staging(io_err).into();
        match app_err {
            AppError::Storage(msg) => assert!(msg.contains("read-only")),
            _ => panic!("Expected Storage variant"),
        }
    }

    #[test]
    fn test_from_validation_error_file_too_large() {
        let validation_err = ValidationError::FileTooLarge {
            size: 11 * 1024 * 1024,
            limit_mb: "10".to_string(),
        };
        let HttpAppError(app_err) = validation_err.into();
        match app_err {
            AppError::PayloadTooLarge(msg) => {
                assert_eq!(msg, "File size exceeds the limit of 10MB")
            }
            _ => panic!("Expected PayloadTooLarge variant"),
        }
    }

    #[test]
    fn test_from_validation_error_mime_not_allowed() {
        let validation_err = ValidationError::MimeTypeNotAllowed {
            mimetype: "text/plain".to_string(),
            allowed: "image/png, image/jpeg".to_string(),
        };
        let HttpAppError(app_err) = validation_err.into();
        match app_err {
            AppError::InvalidInput(msg) => {
                assert_eq!(msg, "File type not allowed. Allowed types: image/png, image/jpeg")
            }
            _ => panic!("Expected InvalidInput variant"),
        }
    }

    #[test]
    fn test_from_upload_error_unwraps_inner() {
        let upload_err = UploadError::Validation(ValidationError::FileTooLarge {
            size: 2,
            limit_mb: "1".to_string(),
        });
        let HttpAppError(app_err) = upload_err.into();
        assert_eq!(app_err.http_status_code(), 413);

        let upload_err = UploadError::Storage(StorageError::Config("missing bucket".to_string()));
        let HttpAppError(app_err) = upload_err.into();
        assert_eq!(app_err.http_status_code(), 500);
    }

    #[test]
    fn test_from_upload_error_body_read_is_client_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "stream ended early");
        let HttpAppError(app_err) = UploadError::Request(BodyReadError(io_err)).into();
        match app_err {
            AppError::BadRequest(ref msg) => {
                assert_eq!(msg, "Failed to read upload body: stream ended early")
            }
            _ => panic!("Expected BadRequest variant"),
        }
        assert_eq!(app_err.http_status_code(), 400);
        assert!(!app_err.is_recoverable());
    }

    #[test]
    fn test_error_response_hides_details_for_sensitive_errors() {
        let app_error = AppError::Storage("secret endpoint detail".to_string());
        let response = ErrorResponse::from_app_error(&app_error, false);
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["error"], "Failed to access storage");
        assert_eq!(json["code"], "STORAGE_ERROR");
        assert_eq!(json["recoverable"], true);
        assert!(json.get("details").is_none());
        assert!(json.get("error_type").is_none());
    }

    #[test]
    fn test_error_response_shape_with_details() {
        let app_error = AppError::InvalidInput("bad key".to_string());
        let response = ErrorResponse::from_app_error(&app_error, true);
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["error"], "bad key");
        assert_eq!(json["code"], "INVALID_INPUT");
        assert_eq!(json["recoverable"], false);
        assert_eq!(json["error_type"], "InvalidInput");
        assert!(json.get("details").and_then(|v| v.as_str()).is_some());
    }
}
