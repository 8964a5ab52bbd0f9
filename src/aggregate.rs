use log::{debug, warn};

use crate::data::model::{LengthType, MeasurementTable};
use crate::error::{Result, VsdError};

/// Merge per-image tables into one sample-level table.
///
/// Measurements are concatenated in the order given. The merged table sums
/// image counts and areas; its area is `None` as soon as one image lacks
/// one, so normalisation then falls back to the image count.
pub fn merge_tables<'a, I>(sample_id: &str, tables: I) -> Result<MeasurementTable>
where
    I: IntoIterator<Item = &'a MeasurementTable>,
{
    let mut tables = tables.into_iter().peekable();
    let Some(first) = tables.peek().copied() else {
        return Err(VsdError::NoImagesAdded {
            sample_id: sample_id.to_string(),
        });
    };

    let length_type = first.length_type;
    let unit = first.unit;
    let mut values = Vec::new();
    let mut area = Some(0.0);
    let mut image_count = 0;
    let mut scale = f64::INFINITY;
    let mut min_diameter = f64::INFINITY;

    for table in tables {
        if table.length_type != length_type {
            return Err(VsdError::MixedLengthType {
                expected: length_type.to_string(),
                found: table.length_type.to_string(),
            });
        }
        // Express everything in the first table's unit.
        let factor = table.unit.convert(1.0, unit);
        values.extend(table.values().iter().map(|v| v * factor));
        area = match (area, table.area) {
            (Some(total), Some(a)) => Some(total + a * factor * factor),
            _ => None,
        };
        image_count += table.image_count;
        scale = scale.min(table.scale * factor);
        min_diameter = min_diameter.min(table.min_diameter * factor);
    }

    if area.is_none() {
        warn!(
            "sample '{sample_id}': image area unknown for at least one image, \
             normalising by image count ({image_count})"
        );
    }
    debug!(
        "sample '{sample_id}': merged {image_count} images into {} measurements",
        values.len()
    );

    Ok(MeasurementTable::from_parts(
        sample_id.to_string(),
        length_type,
        unit,
        scale,
        min_diameter,
        area,
        image_count,
        values,
    ))
}

/// Merge tables after expressing each in `length_type`.
pub fn merge_as<'a, I>(sample_id: &str, tables: I, length_type: LengthType) -> Result<MeasurementTable>
where
    I: IntoIterator<Item = &'a MeasurementTable>,
{
    let converted: Vec<MeasurementTable> = tables
        .into_iter()
        .map(|t| t.to_length_type(length_type))
        .collect();
    merge_tables(sample_id, &converted)
}
