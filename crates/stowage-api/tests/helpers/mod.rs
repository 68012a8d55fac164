//! Test helpers: build the router over an in-memory provider.
//!
//! Run from workspace root: `cargo test -p stowage-api`.

use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stowage_api::setup::routes;
use stowage_api::state::AppState;
use stowage_core::models::UNKNOWN_SIZE;
use stowage_core::{
    Config, FileUploadOptions, ProviderKind, ServerConfig, StorageConfig, UploadedFileResult,
};
use stowage_storage::keys::generate_key;
use stowage_storage::{StorageProvider, StorageResult, StorageService, UploadReader};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

/// Provider that keeps objects in a map and signs URLs with a fake host.
#[derive(Default)]
pub struct MemoryProvider {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryProvider {
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    fn store(&self, filename: &str, data: Vec<u8>) -> String {
        let key = generate_key(filename);
        self.objects.lock().unwrap().insert(key.clone(), data);
        key
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    async fn upload_file(
        &self,
        data: Bytes,
        filename: &str,
        options: &FileUploadOptions,
    ) -> StorageResult<UploadedFileResult> {
        let size = data.len() as i64;
        let key = self.store(filename, data.to_vec());
        Ok(UploadedFileResult {
            url: self.public_url(&key),
            key,
            etag: Some("mem".to_string()),
            size,
            mimetype: options.content_type_or_default().to_string(),
            originalname: filename.to_string(),
        })
    }

    async fn upload_file_from_stream(
        &self,
        mut reader: UploadReader,
        _content_length: Option<u64>,
        filename: &str,
        options: &FileUploadOptions,
    ) -> StorageResult<UploadedFileResult> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        let key = self.store(filename, data);
        Ok(UploadedFileResult {
            url: self.public_url(&key),
            key,
            etag: None,
            size: UNKNOWN_SIZE,
            mimetype: options.content_type_or_default().to_string(),
            originalname: filename.to_string(),
        })
    }

    async fn delete_file(&self, key: &str) -> StorageResult<bool> {
        self.objects.lock().unwrap().remove(key);
        Ok(true)
    }

    async fn get_file_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        Ok(format!(
            "{}?expires={}",
            self.public_url(key),
            expires_in.as_secs()
        ))
    }

    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::S3
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://mem.local/{}", key)
    }
}

/// Test application: server, provider and the staging directory it writes to.
pub struct TestApp {
    pub server: TestServer,
    pub provider: Arc<MemoryProvider>,
    pub tmp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Number of files left behind in the staging directory
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.tmp_dir.path().join("staging"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {})
}

pub fn setup_test_app_with(customize: impl FnOnce(&mut StorageConfig)) -> TestApp {
    let tmp_dir = TempDir::new().expect("create temp dir");

    let mut storage = StorageConfig::new("s3", "test-bucket");
    storage.tmp_dir = tmp_dir.path().join("staging");
    customize(&mut storage);

    let config = Config {
        server: ServerConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            environment: "test".to_string(),
        },
        storage,
    };

    let provider = Arc::new(MemoryProvider::default());
    let storage = StorageService::with_provider(provider.clone(), config.storage());
    let state = Arc::new(AppState { storage, config });
    let router = routes::setup_routes(state).expect("build router");
    let server = TestServer::new(router).expect("start test server");

    TestApp {
        server,
        provider,
        tmp_dir,
    }
}
