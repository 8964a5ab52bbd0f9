use std::collections::BTreeMap;
use std::path::Path;

use log::{info, warn};

use crate::aggregate;
use crate::binning::Histogram;
use crate::correction::{Method, VsdTable};
use crate::data::filter::build_measurement_table;
use crate::data::loader;
use crate::data::model::{
    ImageMetadata, LengthType, LengthUnit, MeasurementTable, RawMeasurements, ScanData,
};
use crate::error::{Result, VsdError};

// ---------------------------------------------------------------------------
// CorrectionResult – one stored VSD
// ---------------------------------------------------------------------------

/// A corrected distribution plus the inputs it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionResult {
    /// Image id for per-image corrections, sample id for aggregated ones.
    pub source: String,
    /// 2D histogram fed to the correction.
    pub histogram: Histogram,
    /// Area the counts were divided by.
    pub normalisation_area: f64,
    pub table: VsdTable,
}

// ---------------------------------------------------------------------------
// Sample – images, scans and corrections of one rock sample
// ---------------------------------------------------------------------------

/// Coordinator owning every image table and correction result of a sample.
pub struct Sample {
    pub id: String,

    /// Unit all measurements and results are expressed in.
    pub unit: LengthUnit,

    /// Per-image tables, stored as diameters, keyed by image id.
    images: BTreeMap<String, MeasurementTable>,

    /// Independent 3D validation sets keyed by scan id.
    scans: BTreeMap<String, ScanData>,

    /// Correction results keyed by the caller's label.
    results: BTreeMap<String, CorrectionResult>,
}

impl Sample {
    pub fn new(id: impl Into<String>, unit: LengthUnit) -> Self {
        Sample {
            id: id.into(),
            unit,
            images: BTreeMap::new(),
            scans: BTreeMap::new(),
            results: BTreeMap::new(),
        }
    }

    // -- images --

    /// Load one image's measurements and metadata from disk.
    ///
    /// `units` is the unit of the metadata pixel scale when the file does not
    /// state one. `min_diameter` is in the sample's unit.
    pub fn add_image(
        &mut self,
        image_id: &str,
        measurement_file: &Path,
        metadata_file: &Path,
        units: LengthUnit,
        min_diameter: f64,
    ) -> Result<&MeasurementTable> {
        self.ensure_new_image(image_id)?;
        let raw = loader::load_measurements(measurement_file)
            .map_err(|e| VsdError::load(measurement_file, e))?;
        let metadata = loader::load_metadata(metadata_file, units, self.unit)
            .map_err(|e| VsdError::load(metadata_file, e))?;
        self.add_measurements(image_id, &raw, &metadata, min_diameter)
    }

    /// Add an image from already-parsed collaborator output.
    pub fn add_measurements(
        &mut self,
        image_id: &str,
        raw: &RawMeasurements,
        metadata: &ImageMetadata,
        min_diameter: f64,
    ) -> Result<&MeasurementTable> {
        self.ensure_new_image(image_id)?;
        let metadata = metadata.in_unit(self.unit);
        let table =
            build_measurement_table(image_id, raw, &metadata, LengthType::Diameter, min_diameter)?;
        info!(
            "sample '{}': added image '{image_id}' with {} vesicles (column '{}')",
            self.id,
            table.len(),
            raw.source_column
        );
        Ok(self.images.entry(image_id.to_string()).or_insert(table))
    }

    fn ensure_new_image(&self, image_id: &str) -> Result<()> {
        if self.images.contains_key(image_id) {
            return Err(VsdError::DuplicateImageId {
                image_id: image_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn image(&self, image_id: &str) -> Option<&MeasurementTable> {
        self.images.get(image_id)
    }

    pub fn image_ids(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// All images merged into one table in `length_type`.
    pub fn aggregated(&self, length_type: LengthType) -> Result<MeasurementTable> {
        aggregate::merge_as(&self.id, self.images.values(), length_type)
    }

    // -- scans --

    /// Attach an independent 3D scan for comparison.
    pub fn add_scan(
        &mut self,
        scan_id: &str,
        measurement_file: &Path,
        metadata_file: &Path,
    ) -> Result<&ScanData> {
        if self.scans.contains_key(scan_id) {
            return Err(VsdError::DuplicateScanId {
                scan_id: scan_id.to_string(),
            });
        }
        let scan = loader::load_scan(scan_id, measurement_file, metadata_file, self.unit)
            .map_err(|e| VsdError::load(measurement_file, e))?;
        info!(
            "sample '{}': added scan '{scan_id}' with {} objects",
            self.id,
            scan.diameters.len()
        );
        Ok(self.scans.entry(scan_id.to_string()).or_insert(scan))
    }

    pub fn scan(&self, scan_id: &str) -> Option<&ScanData> {
        self.scans.get(scan_id)
    }

    pub fn scans(&self) -> impl Iterator<Item = (&str, &ScanData)> {
        self.scans.iter().map(|(k, v)| (k.as_str(), v))
    }

    // -- corrections --

    /// Correct all images together and store the result under `key`.
    ///
    /// An existing result under `key` is replaced. On error the stored
    /// results are left untouched.
    pub fn apply_vsd_corr(
        &mut self,
        key: &str,
        method: &str,
        length_type: LengthType,
        nbins: usize,
    ) -> Result<&CorrectionResult> {
        let method = parse_method(key, method)?;
        let table = self.aggregated(length_type)?;
        let result = correct_table(&table, method, length_type, nbins)?;
        Ok(self.store(key, result))
    }

    /// Correct a single image and store the result under `key`.
    pub fn apply_image_vsd_corr(
        &mut self,
        image_id: &str,
        key: &str,
        method: &str,
        length_type: LengthType,
        nbins: usize,
    ) -> Result<&CorrectionResult> {
        let method = parse_method(key, method)?;
        let table = self
            .images
            .get(image_id)
            .ok_or_else(|| VsdError::UnknownImageId {
                image_id: image_id.to_string(),
            })?
            .to_length_type(length_type);
        let result = correct_table(&table, method, length_type, nbins)?;
        Ok(self.store(key, result))
    }

    fn store(&mut self, key: &str, result: CorrectionResult) -> &CorrectionResult {
        info!(
            "sample '{}': stored {} correction '{key}' ({} bins, {} sections)",
            self.id,
            result.table.method,
            result.table.nbins,
            result.histogram.total()
        );
        if self.results.contains_key(key) {
            warn!("sample '{}': replacing correction '{key}'", self.id);
        }
        self.results.insert(key.to_string(), result);
        &self.results[key]
    }

    pub fn result(&self, key: &str) -> Option<&CorrectionResult> {
        self.results.get(key)
    }

    /// Stored results in key order.
    pub fn results(&self) -> impl Iterator<Item = (&str, &CorrectionResult)> {
        self.results.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn parse_method(key: &str, method: &str) -> Result<Method> {
    method.parse().map_err(|_| VsdError::UnknownMethod {
        key: key.to_string(),
        method: method.to_string(),
    })
}

/// Bin `table`, normalise by its area and run `method`.
fn correct_table(
    table: &MeasurementTable,
    method: Method,
    length_type: LengthType,
    nbins: usize,
) -> Result<CorrectionResult> {
    let histogram = Histogram::from_values(table.values(), nbins)?;
    let normalisation_area = table.normalisation_area();
    let densities = histogram.per_area(normalisation_area);
    let vsd = method
        .correct(&densities, &histogram.edges, length_type)?
        .with_unit(table.unit);

    Ok(CorrectionResult {
        source: table.image_id.clone(),
        histogram,
        normalisation_area,
        table: vsd,
    })
}
