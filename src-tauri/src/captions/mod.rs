//! Image captioning: payload validation and the remote caption service.

pub mod client;
pub mod image_prep;
pub mod prompts;
pub mod types;

use async_trait::async_trait;

use crate::error::CaptionError;

pub use client::{HttpCaptionClient, Provider, DEFAULT_REQUEST_TIMEOUT};
pub use image_prep::validate_image;
pub use types::*;

/// A remote service that turns one image into three captions.
#[async_trait]
pub trait CaptionService: Send + Sync {
    async fn caption(&self, image: &ImageData) -> Result<CaptionSet, CaptionError>;
}
