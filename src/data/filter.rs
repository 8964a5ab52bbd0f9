use log::debug;

use super::model::{ImageMetadata, LengthType, MeasurementTable, RawMeasurements};
use crate::error::{Result, VsdError};

// ---------------------------------------------------------------------------
// Scale + threshold pipeline
// ---------------------------------------------------------------------------

/// Scale pixel diameters to physical units and keep those at or above
/// `min_diameter`. Returns equivalent diameters in input order.
///
/// Non-finite or non-positive raw sizes are dropped with the sub-threshold ones.
pub fn scaled_diameters(raw_px: &[f64], scale: f64, min_diameter: f64) -> Vec<f64> {
    raw_px
        .iter()
        .map(|&px| px * scale)
        .filter(|&d| d.is_finite() && d > 0.0 && d >= min_diameter)
        .collect()
}

/// Build the measurement table for one image.
///
/// The raw outline sizes are diameter-equivalent pixel values: they are
/// scaled by `metadata.scale`, filtered on the equivalent diameter and only
/// then halved when `length_type` is [`LengthType::Radius`].
pub fn build_measurement_table(
    image_id: &str,
    raw: &RawMeasurements,
    metadata: &ImageMetadata,
    length_type: LengthType,
    min_diameter: f64,
) -> Result<MeasurementTable> {
    let scale = metadata.scale;
    if !(scale.is_finite() && scale > 0.0) {
        return Err(VsdError::InvalidScale {
            image_id: image_id.to_string(),
            scale,
        });
    }

    let diameters = scaled_diameters(&raw.diameters_px, scale, min_diameter);
    debug!(
        "image '{image_id}': kept {} of {} outlines (min diameter {min_diameter} {})",
        diameters.len(),
        raw.diameters_px.len(),
        metadata.unit
    );
    if diameters.is_empty() {
        return Err(VsdError::EmptyMeasurementSet {
            image_id: image_id.to_string(),
            min_diameter,
        });
    }

    let values = diameters
        .into_iter()
        .map(|d| length_type.from_diameter(d))
        .collect();

    Ok(MeasurementTable::from_parts(
        image_id.to_string(),
        length_type,
        metadata.unit,
        scale,
        min_diameter,
        metadata.area(),
        1,
        values,
    ))
}
