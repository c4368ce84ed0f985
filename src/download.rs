//! Original-resolution image downloads
//!
//! Streams image bytes to `{imagedir}/{observation_id}_{filename}` through
//! the shared session client, so downloads draw from the same rate-limit
//! budget as every other request. An identically named existing file is
//! overwritten; last write wins.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::client::config::DOWNLOAD_COOLDOWN;
use crate::client::{ClientError, SessionClient};
use crate::output::path::{build_image_path, extension_from_url};
use crate::PhotoRef;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Network failure after the client's retry ceiling
    #[error("download failed: {0}")]
    Network(#[from] ClientError),

    /// Filesystem failure (permissions, disk full, ...)
    #[error("write failed: {0}")]
    Write(String),

    /// The server returned something other than image bytes
    #[error("response is not an image: {0}")]
    NotAnImage(String),

    /// The photo carries no original-resolution URL to fetch
    #[error("photo has no original-resolution URL")]
    MissingUrl,
}

impl DownloadError {
    /// Whether this failure must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DownloadError::Network(e) if e.is_fatal())
    }
}

/// How a completed download interacted with the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The target path did not exist before
    Created,
    /// An identically named file was overwritten
    Replaced,
}

/// Record of one completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    /// Where the bytes landed
    pub target_path: PathBuf,
    /// Number of bytes written
    pub byte_length: u64,
    /// Whether an existing file was replaced
    pub outcome: DownloadOutcome,
}

/// Fetches original-resolution bytes for a photo.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download the photo's original bytes, naming the file after the
    /// observation and the recovered filename.
    async fn download(
        &self,
        photo: &PhotoRef,
        observation_id: u64,
    ) -> Result<DownloadRecord, DownloadError>;
}

/// Downloads images into a configured directory via the session client.
pub struct ImageDownloader {
    client: Arc<SessionClient>,
    image_dir: PathBuf,
}

impl ImageDownloader {
    /// Create a downloader writing into `image_dir` (created on demand).
    pub fn new(client: Arc<SessionClient>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            image_dir: image_dir.into(),
        }
    }

    /// Target file name: the recovered filename when available, otherwise a
    /// name derived from the photo identifier.
    fn target_filename(photo: &PhotoRef, url: &str) -> String {
        match &photo.original_filename {
            Some(name) => name.clone(),
            None => format!("photo_{}.{}", photo.photo_id, extension_from_url(url)),
        }
    }
}

#[async_trait]
impl ImageFetcher for ImageDownloader {
    async fn download(
        &self,
        photo: &PhotoRef,
        observation_id: u64,
    ) -> Result<DownloadRecord, DownloadError> {
        let url = photo.original_url.as_deref().ok_or(DownloadError::MissingUrl)?;

        let filename = Self::target_filename(photo, url);
        let target_path = build_image_path(&self.image_dir, observation_id, &filename)
            .map_err(|e| DownloadError::Write(e.to_string()))?;
        let outcome = if target_path.exists() {
            DownloadOutcome::Replaced
        } else {
            DownloadOutcome::Created
        };

        debug!("Downloading photo {} from {}", photo.photo_id, url);
        let response = self.client.get(url, &[]).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(DownloadError::NotAnImage(content_type));
        }

        let mut file = tokio::fs::File::create(&target_path)
            .await
            .map_err(|e| DownloadError::Write(format!("{}: {e}", target_path.display())))?;

        let mut byte_length: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| ClientError::NetworkError(format!("body stream: {e}")))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::Write(format!("{}: {e}", target_path.display())))?;
            byte_length += chunk.len() as u64;
        }

        file.sync_all()
            .await
            .map_err(|e| DownloadError::Write(format!("{}: {e}", target_path.display())))?;

        info!(
            "Downloaded {} bytes to {}",
            byte_length,
            target_path.display()
        );

        // Media bandwidth guideline: pause between image fetches
        tokio::time::sleep(DOWNLOAD_COOLDOWN).await;

        Ok(DownloadRecord {
            target_path,
            byte_length,
            outcome,
        })
    }
}
