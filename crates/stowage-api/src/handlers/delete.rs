use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    /// `true` once the object is gone, including when it never existed
    pub success: bool,
}

/// Delete a stored object
///
/// Deleting a key that does not exist still succeeds.
#[utoipa::path(
    delete,
    path = "/storage/{key}",
    tag = "storage",
    params(
        ("key" = String, Path, description = "Storage key, percent-encoded (`/` as `%2F`)")
    ),
    responses(
        (status = 200, description = "Object deleted", body = DeleteResponse),
        (status = 400, description = "Invalid key", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "delete_file"))]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>, HttpAppError> {
    let success = state.storage.delete_file(&key).await?;
    Ok(Json(DeleteResponse { success }))
}
