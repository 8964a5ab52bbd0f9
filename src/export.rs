use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::correction::NumericDegeneracy;
use crate::data::model::ScanData;
use crate::sample::{CorrectionResult, Sample};

// ---------------------------------------------------------------------------
// CSV rows
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct VsdRow<'a> {
    key: &'a str,
    method: &'a str,
    length_type: &'a str,
    unit: &'a str,
    bin: usize,
    lower: f64,
    upper: f64,
    midpoint: f64,
    section_count: u64,
    number_density: f64,
    population_density: f64,
    log_population_density: f64,
    degeneracy: &'a str,
}

fn degeneracy_label(d: Option<NumericDegeneracy>) -> &'static str {
    match d {
        None => "",
        Some(NumericDegeneracy::ZeroDensity) => "zero_density",
        Some(NumericDegeneracy::NegativeDensity) => "negative_density",
        Some(NumericDegeneracy::SingularDiagonal) => "singular_diagonal",
        Some(NumericDegeneracy::NonFinite) => "non_finite",
    }
}

/// Write one correction result as CSV, one row per bin.
pub fn write_result<W: Write>(writer: W, key: &str, result: &CorrectionResult) -> Result<()> {
    let table = &result.table;
    let unit = table.unit.map(|u| u.symbol()).unwrap_or("");
    let mut csv = csv::Writer::from_writer(writer);

    for (i, bin) in table.bins.iter().enumerate() {
        csv.serialize(VsdRow {
            key,
            method: table.method.name(),
            length_type: table.length_type.as_str(),
            unit,
            bin: i,
            lower: bin.lower,
            upper: bin.upper,
            midpoint: bin.midpoint,
            section_count: result.histogram.counts.get(i).copied().unwrap_or(0),
            number_density: bin.number_density,
            population_density: bin.population_density,
            log_population_density: bin.log_population_density,
            degeneracy: degeneracy_label(bin.degeneracy),
        })
        .with_context(|| format!("writing row {i} of '{key}'"))?;
    }
    csv.flush().context("flushing CSV writer")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Summary (JSON)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CorrectionSummary {
    pub key: String,
    pub source: String,
    pub method: String,
    pub length_type: String,
    pub nbins: usize,
    pub sections: u64,
    pub normalisation_area: f64,
    pub total_number_density: f64,
    pub vesicularity: f64,
    pub degenerate_bins: Vec<usize>,
}

/// Direct 3D counts of a scan, binned like the correction stored under `key`.
#[derive(Debug, Serialize)]
pub struct ScanHistogram {
    pub key: String,
    pub length_type: String,
    pub nbins: usize,
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
}

#[derive(Debug, Serialize)]
pub struct ScanSummary {
    pub scan_id: String,
    pub objects: usize,
    pub voxel_size: f64,
    pub number_density: Option<f64>,
    pub histograms: Vec<ScanHistogram>,
}

#[derive(Debug, Serialize)]
pub struct SampleSummary {
    pub sample_id: String,
    pub unit: String,
    pub images: Vec<String>,
    pub corrections: Vec<CorrectionSummary>,
    pub scans: Vec<ScanSummary>,
}

fn summarize_scan(sample: &Sample, scan: &ScanData) -> ScanSummary {
    let histograms = sample
        .results()
        .filter_map(|(key, r)| {
            let length_type = r.table.length_type;
            match scan.histogram_as(length_type, r.table.nbins) {
                Ok(hist) => Some(ScanHistogram {
                    key: key.to_string(),
                    length_type: length_type.to_string(),
                    nbins: hist.nbins(),
                    edges: hist.edges.edges().to_vec(),
                    counts: hist.counts,
                }),
                Err(err) => {
                    warn!("scan '{}' not binned for '{key}': {err}", scan.scan_id);
                    None
                }
            }
        })
        .collect();

    ScanSummary {
        scan_id: scan.scan_id.clone(),
        objects: scan.diameters.len(),
        voxel_size: scan.voxel_size,
        number_density: scan.number_density(),
        histograms,
    }
}

pub fn summarize(sample: &Sample) -> SampleSummary {
    SampleSummary {
        sample_id: sample.id.clone(),
        unit: sample.unit.symbol().to_string(),
        images: sample.image_ids().map(str::to_string).collect(),
        corrections: sample
            .results()
            .map(|(key, r)| CorrectionSummary {
                key: key.to_string(),
                source: r.source.clone(),
                method: r.table.method.name().to_string(),
                length_type: r.table.length_type.to_string(),
                nbins: r.table.nbins,
                sections: r.histogram.total(),
                normalisation_area: r.normalisation_area,
                total_number_density: r.table.total_number_density(),
                vesicularity: r.table.vesicularity(),
                degenerate_bins: r.table.degenerate_bins(),
            })
            .collect(),
        scans: sample
            .scans()
            .map(|(_, scan)| summarize_scan(sample, scan))
            .collect(),
    }
}

/// Write `<sample>_<key>.csv` for every stored result plus
/// `<sample>_summary.json` into `dir`. Returns the written paths.
pub fn write_sample(sample: &Sample, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = Vec::new();

    for (key, result) in sample.results() {
        let path = dir.join(format!("{}_{}.csv", sample.id, key));
        let file = std::fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        write_result(file, key, result)?;
        written.push(path);
    }

    let summary_path = dir.join(format!("{}_summary.json", sample.id));
    let file = std::fs::File::create(&summary_path)
        .with_context(|| format!("creating {}", summary_path.display()))?;
    serde_json::to_writer_pretty(file, &summarize(sample)).context("writing summary")?;
    written.push(summary_path);

    info!("wrote {} files to {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{ImageMetadata, LengthType, LengthUnit, RawMeasurements};

    fn corrected_sample() -> Sample {
        let mut sample = Sample::new("S", LengthUnit::Micrometers);
        let raw = RawMeasurements {
            diameters_px: (1..=40).map(|i| i as f64).collect(),
            source_column: "Diameter".into(),
        };
        let meta = ImageMetadata {
            scale: 1.0,
            unit: LengthUnit::Micrometers,
            width_px: Some(500),
            height_px: Some(500),
        };
        sample.add_measurements("a", &raw, &meta, 0.0).unwrap();
        sample
            .apply_vsd_corr("sp", "SahagianProussevitch", LengthType::Diameter, 5)
            .unwrap();
        sample
    }

    #[test]
    fn csv_has_header_and_one_row_per_bin() {
        let sample = corrected_sample();
        let mut buf = Vec::new();
        write_result(&mut buf, "sp", sample.result("sp").unwrap()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("key,method,length_type,unit,bin,lower,upper"));
        assert!(lines[1].starts_with("sp,Sahagian-Proussevitch,diameter,um,0,"));
    }

    #[test]
    fn write_sample_creates_csv_and_summary() {
        let sample = corrected_sample();
        let dir = tempfile::tempdir().unwrap();
        let written = write_sample(&sample, dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("S_sp.csv").exists());

        let summary: serde_json::Value =
            serde_json::from_reader(std::fs::File::open(dir.path().join("S_summary.json")).unwrap())
                .unwrap();
        assert_eq!(summary["corrections"][0]["sections"], 40);
        assert_eq!(summary["images"][0], "a");
    }

    #[test]
    fn summary_bins_scans_like_each_correction() {
        let mut sample = corrected_sample();
        sample
            .apply_vsd_corr("cl", "Cheng-Lemlich", LengthType::Radius, 3)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("scan.csv");
        std::fs::write(&table, "Diameter\n2\n4\n6\n").unwrap();
        let meta = dir.path().join("scan.json");
        std::fs::write(&meta, r#"{"voxel_size": 1.0}"#).unwrap();
        sample.add_scan("ct", &table, &meta).unwrap();

        let summary = summarize(&sample);
        assert_eq!(summary.scans.len(), 1);
        let scan = &summary.scans[0];
        assert_eq!(scan.objects, 3);
        assert_eq!(scan.number_density, None);

        let keys: Vec<&str> = scan.histograms.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["cl", "sp"]);
        let cl = &scan.histograms[0];
        assert_eq!(cl.length_type, "radius");
        assert_eq!(cl.edges, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(cl.counts, vec![1, 1, 1]);
        assert_eq!(scan.histograms[1].nbins, 5);
        assert_eq!(scan.histograms[1].counts.iter().sum::<u64>(), 3);
    }
}
