//! Source-document archival to S3-compatible object storage.
//!
//! Archival is a side channel. The orchestrator runs it next to the
//! submission and reports a failure as a warning; recognition never waits on
//! a retry or aborts because the store is down.

use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use std::path::Path;
use tracing::{debug, info};

/// Stores a local file under a destination key. Injected into [`crate::OcrClient`].
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn store(&self, local_path: &Path, destination_key: &str) -> Result<(), ArchiveError>;
}

/// Client for S3 and S3-compatible stores (MinIO, R2, ...).
pub struct S3Archiver {
    bucket: Box<Bucket>,
}

impl S3Archiver {
    /// Build from config; credentials come from `AWS_ACCESS_KEY_ID`,
    /// `AWS_SECRET_ACCESS_KEY` and optionally `AWS_SESSION_TOKEN`.
    pub fn from_config(config: &ArchiveConfig) -> Result<Self, ArchiveError> {
        let credentials =
            Credentials::from_env().map_err(|e| ArchiveError::Config(e.to_string()))?;
        Self::with_credentials(config, credentials)
    }

    pub fn with_credentials(
        config: &ArchiveConfig,
        credentials: Credentials,
    ) -> Result<Self, ArchiveError> {
        let region_name = config
            .region
            .clone()
            .or_else(|| std::env::var("AWS_REGION").ok())
            .unwrap_or_else(|| "us-east-1".to_string());

        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: region_name,
                endpoint: endpoint.clone(),
            },
            None => region_name
                .parse::<Region>()
                .map_err(|e| ArchiveError::Config(e.to_string()))?,
        };

        let bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| ArchiveError::Config(e.to_string()))?;
        // Custom endpoints rarely support virtual-host addressing.
        let bucket = if config.endpoint.is_some() {
            bucket.with_path_style()
        } else {
            bucket
        };

        info!(bucket = %config.bucket, "Archive storage configured");
        Ok(Self { bucket })
    }
}

#[async_trait]
impl Archiver for S3Archiver {
    async fn store(&self, local_path: &Path, destination_key: &str) -> Result<(), ArchiveError> {
        let data = tokio::fs::read(local_path)
            .await
            .map_err(|source| ArchiveError::Read {
                path: local_path.to_path_buf(),
                source,
            })?;

        let response = self
            .bucket
            .put_object_with_content_type(destination_key, &data, content_type_for(local_path))
            .await?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(ArchiveError::Status {
                status,
                key: destination_key.to_string(),
            });
        }

        debug!(key = destination_key, bytes = data.len(), "Archived source document");
        Ok(())
    }
}

/// Best guess at a MIME type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tif" | "tiff" => "image/tiff",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
