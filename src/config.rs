use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;

use crate::correction::Method;
use crate::data::model::{LengthType, LengthUnit};
use crate::error::VsdError;
use crate::sample::Sample;

// ---------------------------------------------------------------------------
// Run configuration (JSON)
// ---------------------------------------------------------------------------

/// Everything needed to process one sample end to end.
///
/// ```json
/// {
///   "sample_id": "PL-14",
///   "units": "um",
///   "min_diameter": 15.0,
///   "images": [
///     { "id": "a", "measurements": "a.csv", "metadata": "a.json" }
///   ],
///   "corrections": [
///     { "key": "salt", "method": "Saltikov", "length_type": "diameter", "nbins": 12 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub sample_id: String,

    /// Unit of every measurement and result.
    #[serde(default)]
    pub units: LengthUnit,

    /// Unit of metadata pixel scales that do not state one. Defaults to `units`.
    #[serde(default)]
    pub scale_units: Option<LengthUnit>,

    /// Default minimum equivalent diameter, in `units`.
    #[serde(default)]
    pub min_diameter: f64,

    pub images: Vec<ImageSpec>,

    #[serde(default)]
    pub scans: Vec<ScanSpec>,

    pub corrections: Vec<CorrectionSpec>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Skip images left empty by the threshold instead of aborting.
    #[serde(default)]
    pub skip_empty_images: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSpec {
    pub id: String,
    pub measurements: PathBuf,
    pub metadata: PathBuf,
    #[serde(default)]
    pub min_diameter: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanSpec {
    pub id: String,
    pub measurements: PathBuf,
    pub metadata: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorrectionSpec {
    pub key: String,
    pub method: String,
    /// Defaults to the method's classical length type.
    #[serde(default)]
    pub length_type: Option<LengthType>,
    pub nbins: usize,
    /// Correct only this image instead of the whole sample.
    #[serde(default)]
    pub image: Option<String>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("vsd_output")
}

impl CorrectionSpec {
    pub fn effective_length_type(&self) -> LengthType {
        self.length_type.unwrap_or_else(|| {
            self.method
                .parse::<Method>()
                .map(Method::classical_length_type)
                .unwrap_or(LengthType::Diameter)
        })
    }
}

impl RunConfig {
    /// Read a JSON config; relative paths are resolved against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: RunConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for image in &mut self.images {
            resolve(&mut image.measurements);
            resolve(&mut image.metadata);
        }
        for scan in &mut self.scans {
            resolve(&mut scan.measurements);
            resolve(&mut scan.metadata);
        }
        resolve(&mut self.output_dir);
    }

    /// Load every image and scan, then apply every correction in order.
    pub fn run(&self) -> Result<Sample> {
        let mut sample = Sample::new(&self.sample_id, self.units);
        let scale_units = self.scale_units.unwrap_or(self.units);

        for image in &self.images {
            let min_diameter = image.min_diameter.unwrap_or(self.min_diameter);
            match sample.add_image(
                &image.id,
                &image.measurements,
                &image.metadata,
                scale_units,
                min_diameter,
            ) {
                Ok(_) => {}
                Err(err @ VsdError::EmptyMeasurementSet { .. }) if self.skip_empty_images => {
                    warn!("skipping image: {err}");
                }
                Err(err) => return Err(err.into()),
            }
        }

        for scan in &self.scans {
            sample.add_scan(&scan.id, &scan.measurements, &scan.metadata)?;
        }

        for corr in &self.corrections {
            let length_type = corr.effective_length_type();
            match &corr.image {
                Some(image_id) => sample.apply_image_vsd_corr(
                    image_id,
                    &corr.key,
                    &corr.method,
                    length_type,
                    corr.nbins,
                )?,
                None => sample.apply_vsd_corr(&corr.key, &corr.method, length_type, corr.nbins)?,
            };
        }

        info!(
            "sample '{}': {} images, {} corrections",
            sample.id,
            sample.image_count(),
            self.corrections.len()
        );
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_fields() {
        let config: RunConfig = serde_json::from_str(
            r#"{
                "sample_id": "S",
                "images": [{ "id": "a", "measurements": "a.csv", "metadata": "a.json" }],
                "corrections": [
                    { "key": "cl", "method": "Cheng-Lemlich", "nbins": 10 },
                    { "key": "x", "method": "mystery", "nbins": 10 }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.units, LengthUnit::Micrometers);
        assert_eq!(config.min_diameter, 0.0);
        assert_eq!(config.output_dir, PathBuf::from("vsd_output"));
        assert!(!config.skip_empty_images);
        assert_eq!(config.corrections[0].effective_length_type(), LengthType::Radius);
        assert_eq!(config.corrections[1].effective_length_type(), LengthType::Diameter);
    }

    #[test]
    fn relative_paths_follow_config_location() {
        let mut config: RunConfig = serde_json::from_str(
            r#"{
                "sample_id": "S",
                "units": "mm",
                "images": [{ "id": "a", "measurements": "a.csv", "metadata": "/abs/a.json" }],
                "corrections": []
            }"#,
        )
        .unwrap();
        config.resolve_paths(Path::new("/data/run"));
        assert_eq!(config.units, LengthUnit::Millimeters);
        assert_eq!(config.images[0].measurements, PathBuf::from("/data/run/a.csv"));
        assert_eq!(config.images[0].metadata, PathBuf::from("/abs/a.json"));
        assert_eq!(config.output_dir, PathBuf::from("/data/run/vsd_output"));
    }
}
