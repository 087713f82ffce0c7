//! Remote background removal over HTTP

use super::BackgroundRemover;
use crate::error::{PfpError, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;

/// Posts PNG bytes to a segmentation endpoint and returns the response body
///
/// The endpoint must answer `2xx` with an encoded image of the same size.
/// Any other status, or a transport failure, is `ExternalServiceFailure`.
#[derive(Debug, Clone)]
pub struct HttpBackgroundRemover {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpBackgroundRemover {
    /// # Errors
    /// - `InvalidInput` for an endpoint that is not an `http(s)` URL
    /// - `Internal` when the HTTP client cannot be created
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        let lower = endpoint.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(PfpError::invalid_input(format!(
                "removal endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PfpError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key: None,
        })
    }

    /// Send `key` as a bearer token with every request
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BackgroundRemover for HttpBackgroundRemover {
    async fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>> {
        log::debug!(
            "Posting {} bytes to removal service {}",
            image.len(),
            self.endpoint
        );

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "image/png")
            .header(header::ACCEPT, "image/png")
            .body(image.to_vec());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            PfpError::external_service(format!("request to {} failed: {}", self.endpoint, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PfpError::external_service(format!(
                "removal service answered HTTP {}",
                status
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            PfpError::external_service(format!("failed to read removal response: {}", e))
        })?;
        if body.is_empty() {
            return Err(PfpError::external_service(
                "removal service returned an empty body",
            ));
        }

        log::debug!("Removal service returned {} bytes", body.len());
        Ok(body.to_vec())
    }
}
