use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use futures::TryStreamExt;
use std::io;
use std::sync::Arc;
use stowage_core::models::DEFAULT_CONTENT_TYPE;
use stowage_core::{AppError, UploadedFileResult};
use stowage_storage::MultipartUpload;
use tokio_util::io::StreamReader;

const FILE_FIELD: &str = "file";

/// Upload a single file
///
/// The `file` field is streamed to a staging file and then to the configured
/// provider; the body is never held in memory as a whole.
#[utoipa::path(
    post,
    path = "/storage/upload",
    tag = "storage",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File uploaded successfully", body = UploadedFileResult),
        (status = 400, description = "Missing file field or type not allowed", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadedFileResult>, HttpAppError> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("unknown").to_string();
        let mimetype = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        tracing::debug!(filename = %filename, mimetype = %mimetype, "Receiving upload");

        let body = field.map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err));
        let upload = MultipartUpload {
            filename,
            mimetype,
            size: None,
            reader: StreamReader::new(Box::pin(body)),
        };

        let result = state.storage.upload_multipart_file(upload).await?;
        tracing::info!(key = %result.key, size_bytes = result.size, "File uploaded");
        return Ok(Json(result));
    }

    Err(HttpAppError(AppError::BadRequest(
        "No file provided; send one multipart field named 'file'".to_string(),
    )))
}
