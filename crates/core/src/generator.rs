//! Capability traits for the two generation calls.
//!
//! The workflow never talks to a backend directly; it emits requests that
//! the studio runtime hands to whichever [`CopyGenerator`] and
//! [`ImageGenerator`] it was built with (HTTP backend, local renderer,
//! or a test double).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::copy::CopyCandidate;
use crate::error::CoreError;
use crate::types::{CopyId, ImageId};
use crate::upload::UploadedImage;

/// Everything an image generator needs for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub image: UploadedImage,
    pub copy_id: CopyId,
    pub style_name: String,
    /// Effective text of the selected candidate.
    pub prompt: String,
}

/// One generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: ImageId,
    /// Remote URL or `data:` URI.
    pub url: String,
    pub source_style_name: String,
}

/// Produces a batch of styled copy candidates for a product.
#[async_trait]
pub trait CopyGenerator: Send + Sync {
    async fn generate_copies(&self, product: &str) -> Result<Vec<CopyCandidate>, CoreError>;
}

/// Produces one generated image for an uploaded photo and a copy style.
///
/// Failures are reported as [`CoreError::Generation`] carrying a message
/// fit for display.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, CoreError>;
}
