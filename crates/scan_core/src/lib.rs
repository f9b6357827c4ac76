//! Client-side upload, validation and prediction workflow for MRI scan
//! classification.
//!
//! The [`Controller`] owns all workflow state. A presentation layer feeds it
//! candidate files and diagnosis requests, and renders the
//! [`WorkflowSnapshot`]s it publishes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub mod config;
pub mod controller;
pub mod dimensions;
pub mod prediction;
pub mod preview;
pub mod validation;
pub mod workflow;

pub use config::ClientConfig;
pub use controller::Controller;
pub use dimensions::{DecodeError, DimensionReader, ImageDimensionReader};
pub use prediction::{
    HttpPredictionClient, ImageUpload, PredictResponse, PredictionClient, PredictionError,
    PredictionOutcome, is_tumor_label, normalize_label,
};
pub use preview::{PreviewId, PreviewLease, PreviewStore};
pub use validation::{MIN_IMAGE_DIMENSION, Rejection, ValidationOutcome};
pub use workflow::{Generation, Phase, RequestTicket, Selection, Workflow, WorkflowSnapshot};

/// Pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A file handed to the workflow by the user, before any validation.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    name: String,
    content: Arc<[u8]>,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Reads a candidate from disk, using the file name as display name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("cannot read image file: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &Arc<[u8]> {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
