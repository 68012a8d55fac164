//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use stowage_core::Config;
use stowage_storage::StorageService;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.is_production());

    tracing::info!(
        environment = %config.environment(),
        provider = %config.storage().provider,
        bucket = %config.storage().bucket,
        "Configuration loaded and validated successfully"
    );

    let storage = StorageService::new(config.storage())
        .await
        .context("Failed to initialize storage provider")?;

    let state = Arc::new(AppState { storage, config });
    let router = routes::setup_routes(state.clone())?;

    Ok((state, router))
}
