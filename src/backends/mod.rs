//! Background removal backends
//!
//! Background removal is the one stage the pipeline does not compute itself.
//! It is delegated to a [`BackgroundRemover`]:
//! - [`HttpBackgroundRemover`] posts the image to a remote segmentation service
//! - [`UnavailableRemover`] is used when no service is configured
//! - [`mock`] holds deterministic removers for tests and benchmarks

pub mod http;
pub mod mock;

pub use self::http::HttpBackgroundRemover;

use crate::error::{PfpError, Result};
use async_trait::async_trait;

/// Isolates the foreground of an encoded image
///
/// Implementations receive PNG bytes and answer with encoded bytes of the same
/// dimensions where background pixels are transparent.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Remove the background from `image`
    ///
    /// # Errors
    /// - `ExternalServiceFailure` when the service rejects or cannot process the image
    async fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>>;
}

/// Remover that fails every request
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRemover;

#[async_trait]
impl BackgroundRemover for UnavailableRemover {
    async fn remove_background(&self, _image: &[u8]) -> Result<Vec<u8>> {
        Err(PfpError::external_service(
            "no background removal service configured",
        ))
    }
}
