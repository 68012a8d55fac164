use crate::{
    AliOssProvider, ProviderKind, S3Provider, StorageProvider, StorageResult, TencentCosProvider,
};
use std::sync::Arc;
use stowage_core::StorageConfig;

/// Create the storage provider named by the configuration.
///
/// Unknown provider names fall back to S3 instead of failing startup.
pub async fn create_provider(config: &StorageConfig) -> StorageResult<Arc<dyn StorageProvider>> {
    let (kind, fell_back) = ProviderKind::resolve(&config.provider);
    if fell_back {
        tracing::warn!(
            configured = %config.provider,
            "Unknown storage provider, falling back to S3"
        );
    }

    let provider: Arc<dyn StorageProvider> = match kind {
        ProviderKind::S3 => Arc::new(S3Provider::new(config).await?),
        ProviderKind::AliOss => Arc::new(AliOssProvider::new(config)?),
        ProviderKind::TencentCos => Arc::new(TencentCosProvider::new(config)?),
    };

    tracing::info!(
        provider = %kind,
        bucket = %config.bucket,
        region = %config.region,
        "Storage provider initialized"
    );

    Ok(provider)
}
