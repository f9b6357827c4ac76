//! Reading pixel dimensions from candidate image bytes.

use crate::Dimensions;
use async_trait::async_trait;
use image::{GenericImageView, ImageReader};
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("image could not be decoded: {0}")]
    Image(#[from] image::ImageError),
    #[error("image format could not be read: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("decode ended before a result arrived")]
    Aborted,
}

/// Decodes an image and reports its width and height.
#[async_trait]
pub trait DimensionReader: Send + Sync {
    async fn read_dimensions(&self, content: Arc<[u8]>) -> Result<Dimensions, DecodeError>;
}

/// [`DimensionReader`] backed by the `image` crate.
///
/// The whole image is decoded, not just its header, so truncated or corrupt
/// files are refused here rather than by the prediction service. Uploads have
/// no size cap, so the decoder's default allocation limit is lifted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDimensionReader;

impl ImageDimensionReader {
    pub fn decode(content: &[u8]) -> Result<Dimensions, DecodeError> {
        let mut reader = ImageReader::new(Cursor::new(content)).with_guessed_format()?;
        reader.no_limits();
        let img = reader.decode()?;
        let (width, height) = img.dimensions();
        Ok(Dimensions { width, height })
    }
}

#[async_trait]
impl DimensionReader for ImageDimensionReader {
    async fn read_dimensions(&self, content: Arc<[u8]>) -> Result<Dimensions, DecodeError> {
        tokio::task::spawn_blocking(move || Self::decode(&content)).await?
    }
}
