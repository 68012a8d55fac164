//! Configuration module
//!
//! This module provides configuration structures for the API server and the storage
//! subsystem. Values come from environment variables (optionally loaded from `.env`)
//! and are read once at startup; the resulting `Config` is immutable.

use std::env;
use std::path::PathBuf;

// Common constants
const SERVER_PORT: u16 = 3000;
const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_ALLOWED_MIME_TYPES: &str =
    "image/jpeg,image/png,image/gif,image/webp,application/pdf";

/// HTTP server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
}

/// Object storage configuration
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Raw `STORAGE_PROVIDER` value; resolved to a provider kind when the service is built
    pub provider: String,
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>, // Custom endpoint (MinIO, OSS region endpoint, private gateway)
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    /// Public base URL (CDN or custom domain) used instead of the vendor default domain
    pub base_url: Option<String>,
    pub max_file_size: u64,
    pub allowed_mime_types: Vec<String>,
    /// Staging directory for streamed multipart uploads
    pub tmp_dir: PathBuf,
}

impl StorageConfig {
    /// Build a storage config with defaults for everything but the bucket.
    pub fn new(provider: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            bucket: bucket.into(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            access_key_id: None,
            access_key_secret: None,
            base_url: None,
            max_file_size: MAX_FILE_SIZE_BYTES,
            allowed_mime_types: split_list(DEFAULT_ALLOWED_MIME_TYPES),
            tmp_dir: default_tmp_dir(),
        }
    }

    fn from_source<F>(get: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket = get("STORAGE_BUCKET")
            .ok_or_else(|| anyhow::anyhow!("STORAGE_BUCKET must be set"))?;

        let max_file_size = match get("STORAGE_MAX_FILE_SIZE") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                anyhow::anyhow!("STORAGE_MAX_FILE_SIZE must be a number of bytes")
            })?,
            None => MAX_FILE_SIZE_BYTES,
        };

        Ok(StorageConfig {
            provider: get("STORAGE_PROVIDER")
                .map(|s| s.trim().to_lowercase())
                .unwrap_or_else(|| "s3".to_string()),
            bucket,
            region: get("STORAGE_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint: non_empty(get("STORAGE_ENDPOINT")),
            access_key_id: non_empty(get("STORAGE_ACCESS_KEY_ID")),
            access_key_secret: non_empty(get("STORAGE_ACCESS_KEY_SECRET")),
            base_url: non_empty(get("STORAGE_BASE_URL"))
                .map(|url| url.trim_end_matches('/').to_string()),
            max_file_size,
            allowed_mime_types: split_list(
                &get("STORAGE_ALLOWED_MIME_TYPES")
                    .unwrap_or_else(|| DEFAULT_ALLOWED_MIME_TYPES.to_string()),
            ),
            tmp_dir: get("STORAGE_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_tmp_dir),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.bucket.trim().is_empty() {
            return Err(anyhow::anyhow!("STORAGE_BUCKET must not be empty"));
        }

        if self.max_file_size == 0 {
            return Err(anyhow::anyhow!(
                "STORAGE_MAX_FILE_SIZE must be greater than zero"
            ));
        }

        if self.allowed_mime_types.is_empty() {
            return Err(anyhow::anyhow!(
                "STORAGE_ALLOWED_MIME_TYPES must list at least one MIME type"
            ));
        }

        if let Some(ref base_url) = self.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(anyhow::anyhow!(
                    "STORAGE_BASE_URL must start with http:// or https://"
                ));
            }
        }

        Ok(())
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    fn from_source<F>(get: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = get("ENVIRONMENT")
            .or_else(|| get("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str = get("CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        if is_production_name(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let server = ServerConfig {
            server_port: get("PORT")
                .unwrap_or_else(|| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins: cors_origins_str
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            environment,
        };

        let storage = StorageConfig::from_source(&get)?;

        Ok(Config { server, storage })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.storage.validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_name(&self.server.environment)
    }

    pub fn server_port(&self) -> u16 {
        self.server.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.server.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.server.environment
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }
}

fn is_production_name(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn default_tmp_dir() -> PathBuf {
    env::current_dir()
        .unwrap_or_else(|_| env::temp_dir())
        .join("tmp")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
