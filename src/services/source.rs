//! Source image loading
//!
//! Resolves a source reference (`http(s)://` URL, `file://` URL or plain
//! path) to raw bytes. Every failure is reported as `SourceUnavailable`.

use crate::error::{PfpError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::{path::Path, time::Duration};

/// Fetches the raw bytes behind a source reference
#[async_trait]
pub trait SourceLoader: Send + Sync {
    /// Load all bytes behind `reference`
    ///
    /// # Errors
    /// - `SourceUnavailable` when the reference cannot be read
    async fn load(&self, reference: &str) -> Result<Vec<u8>>;
}

/// Loader for HTTP(S) URLs and local files with a size limit
#[derive(Debug, Clone)]
pub struct DefaultSourceLoader {
    client: Client,
    max_bytes: u64,
}

impl DefaultSourceLoader {
    /// # Errors
    /// - `Internal` when the HTTP client cannot be created
    pub fn new(max_bytes: u64, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PfpError::internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, max_bytes })
    }

    fn too_large(&self, reference: &str, size: u64) -> PfpError {
        PfpError::source_unavailable(format!(
            "{} is {} bytes, larger than the {} byte limit",
            reference, size, self.max_bytes
        ))
    }

    async fn load_url(&self, url: &str) -> Result<Vec<u8>> {
        log::debug!("Fetching source image: {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PfpError::source_unavailable(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(PfpError::source_unavailable(format!(
                "HTTP error {} for {}",
                response.status(),
                url
            )));
        }

        if let Some(total) = response.content_length() {
            if total > self.max_bytes {
                return Err(self.too_large(url, total));
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            PfpError::source_unavailable(format!("Failed to read response from {}: {}", url, e))
        })? {
            bytes.extend_from_slice(&chunk);
            if bytes.len() as u64 > self.max_bytes {
                return Err(self.too_large(url, bytes.len() as u64));
            }
        }

        log::debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }

    async fn load_file(&self, path: &Path) -> Result<Vec<u8>> {
        let display = path.display().to_string();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| PfpError::source_unavailable(format!("Cannot read {}: {}", display, e)))?;
        if metadata.len() > self.max_bytes {
            return Err(self.too_large(&display, metadata.len()));
        }

        tokio::fs::read(path)
            .await
            .map_err(|e| PfpError::source_unavailable(format!("Cannot read {}: {}", display, e)))
    }
}

#[async_trait]
impl SourceLoader for DefaultSourceLoader {
    async fn load(&self, reference: &str) -> Result<Vec<u8>> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(PfpError::source_unavailable("empty source reference"));
        }

        let lower = reference.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            self.load_url(reference).await
        } else if let Some(path) = reference.strip_prefix("file://") {
            self.load_file(Path::new(path)).await
        } else if lower.contains("://") {
            Err(PfpError::source_unavailable(format!(
                "unsupported source scheme in '{}'",
                reference
            )))
        } else {
            self.load_file(Path::new(reference)).await
        }
    }
}
