use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, Float32Array, Float64Array, Int32Array, Int64Array};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;

use super::model::{ImageMetadata, LengthUnit, RawMeasurements, ScanData};

/// Column names accepted as a diameter-equivalent size, lower-cased.
const DIAMETER_COLUMNS: &[&str] = &[
    "diameter",
    "eqdiameter",
    "eq_diameter",
    "equivalent diameter",
    "equivalent_diameter",
    "feret",
];
const AREA_COLUMNS: &[&str] = &["area"];
const VOLUME_COLUMNS: &[&str] = &["volume", "voxels", "volume (voxels)"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load per-vesicle section sizes (pixels) from a measurement table.
/// Dispatch by extension.
///
/// Supported formats:
/// * `.csv`                  – comma separated, header row
/// * `.txt` / `.tsv` / `.xls` – tab separated, header row (image-analysis exports)
/// * `.parquet`              – one numeric column per quantity
///
/// The size column is the first diameter-like column found (`Diameter`,
/// `Feret`, ...). Without one, an `Area` column is converted to the
/// equivalent-circle diameter `2·sqrt(A/π)`.
pub fn load_measurements(path: &Path) -> Result<RawMeasurements> {
    let columns = read_numeric_columns(path)?;
    if let Some((name, values)) = find_column(&columns, DIAMETER_COLUMNS) {
        return Ok(RawMeasurements {
            diameters_px: values.to_vec(),
            source_column: name.to_string(),
        });
    }
    if let Some((name, values)) = find_column(&columns, AREA_COLUMNS) {
        return Ok(RawMeasurements {
            diameters_px: values.iter().map(|&a| equivalent_circle_diameter(a)).collect(),
            source_column: name.to_string(),
        });
    }
    bail!(
        "{}: no diameter or area column (found: {})",
        path.display(),
        column_list(&columns)
    )
}

/// Load the pixel scale of one image.
///
/// `default_unit` is assumed when the file does not state the unit of its
/// scale; the returned metadata is expressed in `target_unit`.
pub fn load_metadata(
    path: &Path,
    default_unit: LengthUnit,
    target_unit: LengthUnit,
) -> Result<ImageMetadata> {
    let fields = read_metadata_fields(path)?;
    let scale = fields
        .scale
        .with_context(|| format!("{}: no pixel scale entry", path.display()))?;
    let unit = fields.unit.unwrap_or(default_unit);

    Ok(ImageMetadata {
        scale,
        unit,
        width_px: fields.width,
        height_px: fields.height,
    }
    .in_unit(target_unit))
}

/// Load an independent 3D scan: object sizes plus voxel metadata.
///
/// Object sizes are read from a `Volume` column (voxels, converted to the
/// equivalent-sphere diameter) or a diameter column (voxel units).
pub fn load_scan(
    scan_id: &str,
    measurement_path: &Path,
    metadata_path: &Path,
    target_unit: LengthUnit,
) -> Result<ScanData> {
    let columns = read_numeric_columns(measurement_path)?;
    let diameters_vox: Vec<f64> =
        if let Some((_, volumes)) = find_column(&columns, VOLUME_COLUMNS) {
            volumes.iter().map(|&v| equivalent_sphere_diameter(v)).collect()
        } else if let Some((_, diameters)) = find_column(&columns, DIAMETER_COLUMNS) {
            diameters.to_vec()
        } else {
            bail!(
                "{}: no volume or diameter column (found: {})",
                measurement_path.display(),
                column_list(&columns)
            )
        };

    let fields = read_metadata_fields(metadata_path)?;
    let voxel = fields
        .scale
        .with_context(|| format!("{}: no voxel size entry", metadata_path.display()))?;
    let voxel_size = fields.unit.unwrap_or(target_unit).convert(voxel, target_unit);
    if !(voxel_size.is_finite() && voxel_size > 0.0) {
        bail!("{}: voxel size must be positive, got {voxel_size}", metadata_path.display());
    }

    let volume = match (fields.width, fields.height, fields.depth) {
        (Some(w), Some(h), Some(d)) => {
            Some(w as f64 * h as f64 * d as f64 * voxel_size.powi(3))
        }
        _ => None,
    };

    Ok(ScanData {
        scan_id: scan_id.to_string(),
        unit: target_unit,
        voxel_size,
        volume,
        diameters: diameters_vox
            .into_iter()
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d * voxel_size)
            .collect(),
    })
}

pub fn equivalent_circle_diameter(area: f64) -> f64 {
    2.0 * (area / std::f64::consts::PI).sqrt()
}

pub fn equivalent_sphere_diameter(volume: f64) -> f64 {
    (6.0 * volume / std::f64::consts::PI).cbrt()
}

// ---------------------------------------------------------------------------
// Table readers
// ---------------------------------------------------------------------------

type NumericColumns = Vec<(String, Vec<f64>)>;

fn read_numeric_columns(path: &Path) -> Result<NumericColumns> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => read_parquet_columns(path),
        "csv" => read_delimited_columns(path, b','),
        "txt" | "tsv" | "xls" => read_delimited_columns(path, b'\t'),
        other => bail!("Unsupported measurement file extension: .{other}"),
    }
}

fn find_column<'a>(columns: &'a NumericColumns, candidates: &[&str]) -> Option<(&'a str, &'a [f64])> {
    candidates.iter().find_map(|wanted| {
        columns
            .iter()
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(wanted))
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    })
}

fn column_list(columns: &NumericColumns) -> String {
    columns
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Delimited layout: header row with column names, one outline per row.
/// Columns with any non-numeric cell are skipped (labels, slice names).
fn read_delimited_columns(path: &Path, delimiter: u8) -> Result<NumericColumns> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading table headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut values: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    let mut numeric = vec![true; headers.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("{} row {row_no}", path.display()))?;
        for (col_idx, column) in values.iter_mut().enumerate() {
            if !numeric[col_idx] {
                continue;
            }
            match record.get(col_idx).map(str::trim) {
                Some(cell) if !cell.is_empty() => match cell.parse::<f64>() {
                    Ok(v) => column.push(v),
                    Err(_) => numeric[col_idx] = false,
                },
                _ => column.push(f64::NAN),
            }
        }
    }

    Ok(headers
        .into_iter()
        .zip(values)
        .zip(numeric)
        .filter(|(_, is_numeric)| *is_numeric)
        .map(|(column, _)| column)
        .collect())
}

/// Load every numeric column of a Parquet file.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn read_parquet_columns(path: &Path) -> Result<NumericColumns> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: NumericColumns = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        for (col_idx, field) in schema.fields().iter().enumerate() {
            let Some(values) = extract_f64_column(batch.column(col_idx)) else {
                continue;
            };
            match columns.iter_mut().find(|(name, _)| name == field.name()) {
                Some((_, existing)) => existing.extend(values),
                None => columns.push((field.name().clone(), values)),
            }
        }
    }

    Ok(columns)
}

/// Numeric Arrow column as `f64`; nulls become NaN. `None` for other types.
fn extract_f64_column(col: &Arc<dyn Array>) -> Option<Vec<f64>> {
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<Float64Array>() {
        Some(arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(arr) = any.downcast_ref::<Float32Array>() {
        Some(arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
    } else if let Some(arr) = any.downcast_ref::<Int64Array>() {
        Some(arr.iter().map(|v| v.map_or(f64::NAN, |i| i as f64)).collect())
    } else {
        any.downcast_ref::<Int32Array>()
            .map(|arr| arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
    }
}

// ---------------------------------------------------------------------------
// Metadata readers
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct MetadataFields {
    #[serde(alias = "pixel_size", alias = "PixelWidth", alias = "voxel_size")]
    scale: Option<f64>,
    #[serde(alias = "units")]
    unit: Option<LengthUnit>,
    #[serde(alias = "ResolutionX")]
    width: Option<u32>,
    #[serde(alias = "ResolutionY")]
    height: Option<u32>,
    #[serde(alias = "ResolutionZ")]
    depth: Option<u32>,
}

fn read_metadata_fields(path: &Path) -> Result<MetadataFields> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading metadata file {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&text).with_context(|| format!("parsing JSON {}", path.display()))
    } else {
        parse_key_value_metadata(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

/// `key=value` (or `key: value`) lines, as written into microscope image
/// headers. Section headers (`[...]`), comments and unknown keys are ignored.
fn parse_key_value_metadata(text: &str) -> Result<MetadataFields> {
    let mut fields = MetadataFields::default();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('[') || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=').or_else(|| line.split_once(':')) else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "pixelwidth" | "pixel_size" | "scale" | "voxel_size" => {
                fields.scale = Some(
                    value
                        .parse()
                        .with_context(|| format!("line {}: '{value}' is not a number", line_no + 1))?,
                );
            }
            "unit" | "units" => {
                fields.unit = Some(
                    value
                        .parse()
                        .map_err(|e: String| anyhow::anyhow!("line {}: {e}", line_no + 1))?,
                );
            }
            "resolutionx" | "width" => fields.width = value.parse().ok(),
            "resolutiony" | "height" => fields.height = value.parse().ok(),
            "resolutionz" | "depth" => fields.depth = value.parse().ok(),
            _ => {}
        }
    }

    Ok(fields)
}
