//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use stowage_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stowage API",
        version = "0.1.0",
        description = "Object storage API: upload, delete and sign URLs for files held by an S3-compatible, Ali OSS or Tencent COS bucket."
    ),
    paths(
        handlers::upload::upload_file,
        handlers::delete::delete_file,
        handlers::url::get_file_url,
        handlers::health::health_check,
    ),
    components(schemas(
        models::UploadedFileResult,
        handlers::delete::DeleteResponse,
        handlers::url::UrlResponse,
        handlers::health::HealthResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "storage", description = "Object upload, deletion and signed URLs"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;
