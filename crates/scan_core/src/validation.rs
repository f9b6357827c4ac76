//! Minimum-dimension policy applied to every candidate image.

use crate::Dimensions;
use crate::preview::PreviewId;

/// Smallest accepted width and height, in pixels.
pub const MIN_IMAGE_DIMENSION: u32 = 64;

pub const DECODE_FAILED_MESSAGE: &str = "Failed to load image. Please try another file.";

/// Result of validating one submitted candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted {
        preview: PreviewId,
        dimensions: Dimensions,
    },
    Rejected(Rejection),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Why a candidate was refused. `measured` is `None` when the image could not
/// be decoded at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: String,
    pub measured: Option<Dimensions>,
}

impl Rejection {
    pub fn undecodable() -> Self {
        Self {
            reason: DECODE_FAILED_MESSAGE.to_string(),
            measured: None,
        }
    }

    pub fn too_small(dimensions: Dimensions) -> Self {
        Self {
            reason: format!(
                "Image is too small ({}x{}px). Minimum requirement is {MIN_IMAGE_DIMENSION}x{MIN_IMAGE_DIMENSION} pixels.",
                dimensions.width, dimensions.height
            ),
            measured: Some(dimensions),
        }
    }
}

/// Applies the size policy. Both sides must reach the minimum.
pub fn check_dimensions(dimensions: Dimensions) -> Result<(), Rejection> {
    if dimensions.width < MIN_IMAGE_DIMENSION || dimensions.height < MIN_IMAGE_DIMENSION {
        return Err(Rejection::too_small(dimensions));
    }
    Ok(())
}
