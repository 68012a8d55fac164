use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UrlQuery {
    /// Lifetime of the signed URL in seconds (default 3600)
    pub expires_in: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UrlResponse {
    pub url: String,
}

/// Get a time-limited signed URL for an object
#[utoipa::path(
    get,
    path = "/storage/{key}/url",
    tag = "storage",
    params(
        ("key" = String, Path, description = "Storage key, percent-encoded (`/` as `%2F`)"),
        UrlQuery
    ),
    responses(
        (status = 200, description = "Signed URL", body = UrlResponse),
        (status = 400, description = "Invalid key or query", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "get_file_url"))]
pub async fn get_file_url(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<UrlResponse>, HttpAppError> {
    let url = state.storage.get_file_url(&key, query.expires_in).await?;
    Ok(Json(UrlResponse { url }))
}
