use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Structural errors
// ---------------------------------------------------------------------------

/// Errors that abort an operation.
///
/// Per-bin numeric problems inside a correction are not errors; they are
/// recorded on the result table as [`crate::correction::NumericDegeneracy`].
#[derive(Error, Debug)]
pub enum VsdError {
    #[error("image '{image_id}': pixel scale must be a positive finite number, got {scale}")]
    InvalidScale { image_id: String, scale: f64 },

    #[error("image '{image_id}': no measurements at or above the minimum diameter {min_diameter}")]
    EmptyMeasurementSet { image_id: String, min_diameter: f64 },

    #[error("invalid bin count {nbins}: {reason}")]
    InvalidBinCount { nbins: usize, reason: String },

    #[error("correction '{key}': unknown method '{method}' (expected Saltikov, ChengLemlich or SahagianProussevitch)")]
    UnknownMethod { key: String, method: String },

    #[error("image id '{image_id}' has already been added to this sample")]
    DuplicateImageId { image_id: String },

    #[error("scan id '{scan_id}' has already been added to this sample")]
    DuplicateScanId { scan_id: String },

    #[error("image id '{image_id}' is not part of this sample")]
    UnknownImageId { image_id: String },

    #[error("sample '{sample_id}': no images have been added")]
    NoImagesAdded { sample_id: String },

    #[error("cannot bin measurements spanning [0, {max}]: the upper bound must be positive and finite")]
    DegenerateRange { max: f64 },

    #[error("cannot merge measurement tables measured as {expected} with tables measured as {found}")]
    MixedLengthType { expected: String, found: String },

    #[error("failed to load '{}'", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl VsdError {
    /// Wrap a collaborator failure (file reader) together with the offending path.
    pub fn load(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        VsdError::Load {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VsdError>;
