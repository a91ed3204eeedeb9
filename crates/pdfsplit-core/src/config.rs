//! Storage configuration for split jobs.
//!
//! Everything a job needs to reach its bucket lives in one typed
//! structure; nothing is looked up by string key at runtime.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};

use crate::gateway::ObjectStoreGateway;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which storage backend a job talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageProvider {
    /// AWS S3
    AwsS3,
    /// Cloudflare R2
    CloudflareR2,
    /// Self-hosted MinIO
    #[serde(rename = "minio")]
    MinIo,
    /// Local filesystem (for development)
    Local,
}

/// Storage configuration for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// The storage provider to use
    pub provider: StorageProvider,
    /// Bucket name (or local path for the Local provider)
    pub bucket: String,
    /// AWS region (use "auto" for R2)
    #[serde(default)]
    pub region: String,
    /// Custom endpoint URL (required for R2 and MinIO)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// AWS access key ID
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// AWS secret access key
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Deadline for a single fetch or upload, in seconds
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl StorageConfig {
    /// Configuration for an S3 bucket in the given region.
    pub fn s3(bucket: &str, region: &str) -> Self {
        Self {
            provider: StorageProvider::AwsS3,
            bucket: bucket.to_string(),
            region: region.to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Configuration for an R2 bucket; the endpoint follows from the
    /// account id.
    pub fn r2(bucket: &str, account_id: &str) -> Self {
        Self {
            provider: StorageProvider::CloudflareR2,
            bucket: bucket.to_string(),
            region: "auto".to_string(),
            endpoint: Some(format!("https://{}.r2.cloudflarestorage.com", account_id)),
            access_key_id: None,
            secret_access_key: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Filesystem-backed configuration rooted at `path`, for development
    /// and tests.
    pub fn local(path: &str) -> Self {
        Self {
            provider: StorageProvider::Local,
            bucket: path.to_string(),
            region: String::new(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Attach explicit AWS credentials.
    pub fn with_credentials(mut self, access_key_id: &str, secret_access_key: &str) -> Self {
        self.access_key_id = Some(access_key_id.to_string());
        self.secret_access_key = Some(secret_access_key.to_string());
        self
    }

    /// Read configuration from the environment.
    ///
    /// Recognized variables:
    /// - SPLITTER_STORAGE_PROVIDER: "aws_s3", "cloudflare_r2", "minio", or "local"
    /// - SPLITTER_BUCKET: Bucket name or local path
    /// - SPLITTER_REGION: AWS region (default: "auto")
    /// - R2_ENDPOINT or MINIO_ENDPOINT: Custom endpoint URL
    /// - AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY: Credentials
    /// - SPLITTER_TIMEOUT_SECS: Per-request deadline
    pub fn from_env() -> Result<Self> {
        let provider_str =
            std::env::var("SPLITTER_STORAGE_PROVIDER").unwrap_or_else(|_| "local".to_string());

        let provider = match provider_str.to_lowercase().as_str() {
            "aws_s3" | "s3" => StorageProvider::AwsS3,
            "cloudflare_r2" | "r2" => StorageProvider::CloudflareR2,
            "minio" => StorageProvider::MinIo,
            "local" => StorageProvider::Local,
            _ => return Err(anyhow!("Unknown storage provider: {}", provider_str)),
        };

        let bucket =
            std::env::var("SPLITTER_BUCKET").unwrap_or_else(|_| "./splitter-data".to_string());

        let region = std::env::var("SPLITTER_REGION").unwrap_or_else(|_| "auto".to_string());

        let endpoint = std::env::var("R2_ENDPOINT")
            .or_else(|_| std::env::var("MINIO_ENDPOINT"))
            .ok();

        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok();
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok();

        let request_timeout_secs = std::env::var("SPLITTER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            provider,
            bucket,
            region,
            endpoint,
            access_key_id,
            secret_access_key,
            request_timeout_secs,
        })
    }

    /// Read configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Construct the `object_store` backend this configuration describes.
    pub fn build_object_store(&self) -> Result<Arc<dyn ObjectStore>> {
        match &self.provider {
            StorageProvider::CloudflareR2 | StorageProvider::MinIo => {
                let endpoint = self
                    .endpoint
                    .as_ref()
                    .ok_or_else(|| anyhow!("Endpoint required for {:?}", self.provider))?;

                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(&self.bucket)
                    .with_region(&self.region)
                    .with_endpoint(endpoint)
                    .with_virtual_hosted_style_request(false);

                if let (Some(key), Some(secret)) = (&self.access_key_id, &self.secret_access_key) {
                    builder = builder
                        .with_access_key_id(key)
                        .with_secret_access_key(secret);
                }

                Ok(Arc::new(builder.build()?))
            }

            StorageProvider::AwsS3 => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(&self.bucket)
                    .with_region(&self.region);

                if let (Some(key), Some(secret)) = (&self.access_key_id, &self.secret_access_key) {
                    builder = builder
                        .with_access_key_id(key)
                        .with_secret_access_key(secret);
                }

                Ok(Arc::new(builder.build()?))
            }

            StorageProvider::Local => {
                // A missing local root is created, not an error.
                std::fs::create_dir_all(&self.bucket)?;
                Ok(Arc::new(LocalFileSystem::new_with_prefix(&self.bucket)?))
            }
        }
    }

    /// Construct a ready-to-use gateway with this configuration's
    /// deadline applied.
    pub fn build_gateway(&self) -> Result<ObjectStoreGateway> {
        Ok(ObjectStoreGateway::new(
            self.build_object_store()?,
            Duration::from_secs(self.request_timeout_secs),
        ))
    }
}
