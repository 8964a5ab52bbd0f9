use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::binning::Histogram;
use crate::error::Result;

// ---------------------------------------------------------------------------
// LengthType – which linear size a table holds
// ---------------------------------------------------------------------------

/// Linear size carried by a measurement: the section radius or diameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthType {
    Radius,
    Diameter,
}

impl LengthType {
    /// Convert an equivalent diameter into this length type.
    pub fn from_diameter(self, diameter: f64) -> f64 {
        match self {
            LengthType::Radius => diameter / 2.0,
            LengthType::Diameter => diameter,
        }
    }

    /// Convert a value of this length type back to a diameter.
    pub fn to_diameter(self, value: f64) -> f64 {
        match self {
            LengthType::Radius => value * 2.0,
            LengthType::Diameter => value,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LengthType::Radius => "radius",
            LengthType::Diameter => "diameter",
        }
    }
}

impl fmt::Display for LengthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LengthType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "radius" | "r" => Ok(LengthType::Radius),
            "diameter" | "d" => Ok(LengthType::Diameter),
            other => Err(format!("unknown length type '{other}' (expected radius or diameter)")),
        }
    }
}

// ---------------------------------------------------------------------------
// LengthUnit – physical unit of a length
// ---------------------------------------------------------------------------

/// Physical length unit used for scales and measurements.
///
/// Deserialization goes through [`FromStr`], so JSON, key=value files and
/// the command line accept the same spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum LengthUnit {
    Meters,
    Millimeters,
    #[default]
    Micrometers,
    Nanometers,
}

impl LengthUnit {
    fn meters_per_unit(self) -> f64 {
        match self {
            LengthUnit::Meters => 1.0,
            LengthUnit::Millimeters => 1e-3,
            LengthUnit::Micrometers => 1e-6,
            LengthUnit::Nanometers => 1e-9,
        }
    }

    /// Express `value` (given in `self`) in `target` units.
    pub fn convert(self, value: f64, target: LengthUnit) -> f64 {
        if self == target {
            return value;
        }
        value * self.meters_per_unit() / target.meters_per_unit()
    }

    pub fn symbol(self) -> &'static str {
        match self {
            LengthUnit::Meters => "m",
            LengthUnit::Millimeters => "mm",
            LengthUnit::Micrometers => "um",
            LengthUnit::Nanometers => "nm",
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for LengthUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "meter" | "meters" | "metre" | "metres" => Ok(LengthUnit::Meters),
            "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => {
                Ok(LengthUnit::Millimeters)
            }
            "um" | "µm" | "μm" | "micron" | "microns" | "micrometer" | "micrometers"
            | "micrometre" | "micrometres" => Ok(LengthUnit::Micrometers),
            "nm" | "nanometer" | "nanometers" | "nanometre" | "nanometres" => {
                Ok(LengthUnit::Nanometers)
            }
            other => Err(format!("unknown length unit '{other}'")),
        }
    }
}

impl TryFrom<String> for LengthUnit {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Raw collaborator output
// ---------------------------------------------------------------------------

/// Per-vesicle sizes as reported by the feature-extraction tool, in pixels.
#[derive(Debug, Clone, Default)]
pub struct RawMeasurements {
    /// Diameter-equivalent size of each detected outline, in pixels.
    pub diameters_px: Vec<f64>,
    /// Name of the column the sizes were read from.
    pub source_column: String,
}

/// Pixel scale and optional frame size for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetadata {
    /// Physical length per pixel, expressed in `unit`.
    pub scale: f64,
    pub unit: LengthUnit,
    pub width_px: Option<u32>,
    pub height_px: Option<u32>,
}

impl ImageMetadata {
    /// Same metadata with the scale expressed in another unit.
    pub fn in_unit(&self, unit: LengthUnit) -> ImageMetadata {
        ImageMetadata {
            scale: self.unit.convert(self.scale, unit),
            unit,
            ..self.clone()
        }
    }

    /// Analysed area in squared physical units, when the frame size is known.
    pub fn area(&self) -> Option<f64> {
        match (self.width_px, self.height_px) {
            (Some(w), Some(h)) => Some(w as f64 * h as f64 * self.scale * self.scale),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// MeasurementTable – filtered physical-unit sizes for one image (or merged)
// ---------------------------------------------------------------------------

/// Ordered physical-unit linear measurements plus their provenance.
///
/// Built once by [`crate::data::filter::build_measurement_table`] (or by the
/// aggregator) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementTable {
    /// Image identifier (or sample identifier for a merged table).
    pub image_id: String,
    pub length_type: LengthType,
    pub unit: LengthUnit,
    /// Physical length per pixel. Merged tables keep the finest contributing scale.
    pub scale: f64,
    /// Minimum equivalent diameter kept, in `unit`.
    pub min_diameter: f64,
    /// Total analysed area in `unit`², if every contributing image reported one.
    pub area: Option<f64>,
    /// Number of images that contributed measurements.
    pub image_count: usize,
    values: Vec<f64>,
}

impl MeasurementTable {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        image_id: String,
        length_type: LengthType,
        unit: LengthUnit,
        scale: f64,
        min_diameter: f64,
        area: Option<f64>,
        image_count: usize,
        values: Vec<f64>,
    ) -> Self {
        MeasurementTable {
            image_id,
            length_type,
            unit,
            scale,
            min_diameter,
            area,
            image_count,
            values,
        }
    }

    /// The measurements, in `length_type` and `unit`.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Area used to turn counts into per-area densities.
    ///
    /// Falls back to the image count (one unit area per image) when any
    /// contributing image lacked a frame size.
    pub fn normalisation_area(&self) -> f64 {
        self.area.unwrap_or(self.image_count.max(1) as f64)
    }

    /// An explicit copy of this table expressed in another length type.
    pub fn to_length_type(&self, length_type: LengthType) -> MeasurementTable {
        if length_type == self.length_type {
            return self.clone();
        }
        let values = self
            .values
            .iter()
            .map(|&v| length_type.from_diameter(self.length_type.to_diameter(v)))
            .collect();
        MeasurementTable {
            length_type,
            values,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// ScanData – independent 3D validation set
// ---------------------------------------------------------------------------

/// Equivalent-sphere diameters measured directly in a 3D scan.
///
/// Used only for comparison with the corrected distributions.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanData {
    pub scan_id: String,
    pub unit: LengthUnit,
    /// Edge length of one voxel, in `unit`.
    pub voxel_size: f64,
    /// Scanned volume in `unit`³, if the metadata reported the grid size.
    pub volume: Option<f64>,
    pub diameters: Vec<f64>,
}

impl ScanData {
    /// Direct 3D histogram of the scanned diameters.
    pub fn histogram(&self, nbins: usize) -> Result<Histogram> {
        Histogram::from_values(&self.diameters, nbins)
    }

    /// Direct 3D histogram with sizes expressed in `length_type`, for
    /// comparison against a correction binned the same way.
    pub fn histogram_as(&self, length_type: LengthType, nbins: usize) -> Result<Histogram> {
        let sizes: Vec<f64> = self
            .diameters
            .iter()
            .map(|&d| length_type.from_diameter(d))
            .collect();
        Histogram::from_values(&sizes, nbins)
    }

    /// Number of objects per unit volume, when the scanned volume is known.
    pub fn number_density(&self) -> Option<f64> {
        self.volume
            .filter(|v| *v > 0.0)
            .map(|v| self.diameters.len() as f64 / v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unit_conversion_scales_by_powers_of_ten() {
        assert_relative_eq!(LengthUnit::Meters.convert(2.5e-6, LengthUnit::Micrometers), 2.5);
        assert_relative_eq!(LengthUnit::Millimeters.convert(1.0, LengthUnit::Micrometers), 1000.0);
        assert_relative_eq!(LengthUnit::Nanometers.convert(500.0, LengthUnit::Micrometers), 0.5);
    }

    #[test]
    fn length_unit_parses_common_spellings() {
        assert_eq!("µm".parse::<LengthUnit>(), Ok(LengthUnit::Micrometers));
        assert_eq!("Microns".parse::<LengthUnit>(), Ok(LengthUnit::Micrometers));
        assert_eq!("mm".parse::<LengthUnit>(), Ok(LengthUnit::Millimeters));
        assert!("furlong".parse::<LengthUnit>().is_err());
    }

    #[test]
    fn metadata_area_needs_both_dimensions() {
        let meta = ImageMetadata {
            scale: 0.5,
            unit: LengthUnit::Micrometers,
            width_px: Some(100),
            height_px: Some(40),
        };
        assert_relative_eq!(meta.area().unwrap(), 1000.0);

        let partial = ImageMetadata {
            height_px: None,
            ..meta
        };
        assert!(partial.area().is_none());
    }

    #[test]
    fn converting_table_to_radius_halves_values() {
        let table = MeasurementTable::from_parts(
            "img".into(),
            LengthType::Diameter,
            LengthUnit::Micrometers,
            1.0,
            0.0,
            None,
            1,
            vec![10.0, 20.0],
        );
        let radii = table.to_length_type(LengthType::Radius);
        assert_eq!(radii.values(), &[5.0, 10.0]);
        assert_eq!(radii.length_type, LengthType::Radius);
        assert_eq!(radii.to_length_type(LengthType::Diameter).values(), table.values());
    }

    #[test]
    fn normalisation_area_falls_back_to_image_count() {
        let table = MeasurementTable::from_parts(
            "merged".into(),
            LengthType::Diameter,
            LengthUnit::Micrometers,
            1.0,
            0.0,
            None,
            3,
            vec![1.0],
        );
        assert_relative_eq!(table.normalisation_area(), 3.0);
    }
}
