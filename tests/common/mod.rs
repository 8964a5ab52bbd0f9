use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Write a single-column `Diameter` CSV (pixel units).
pub fn write_measurements(dir: &Path, name: &str, diameters_px: &[f64]) -> PathBuf {
    let path = dir.join(format!("{name}.csv"));
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer.write_record(["Diameter"]).unwrap();
    for d in diameters_px {
        writer.write_record([d.to_string()]).unwrap();
    }
    writer.flush().unwrap();
    path
}

/// Write a JSON metadata file with the given scale (µm per pixel).
pub fn write_metadata(dir: &Path, name: &str, scale_um: f64, frame: Option<(u32, u32)>) -> PathBuf {
    let path = dir.join(format!("{name}.json"));
    let mut meta = serde_json::json!({ "scale": scale_um, "unit": "um" });
    if let Some((w, h)) = frame {
        meta["width"] = w.into();
        meta["height"] = h.into();
    }
    std::fs::write(&path, meta.to_string()).unwrap();
    path
}

pub struct ImageFixture {
    pub dir: TempDir,
    pub measurements: PathBuf,
    pub metadata: PathBuf,
}

/// One image on disk, 1 µm per pixel.
pub fn image_fixture(diameters_px: &[f64]) -> ImageFixture {
    let dir = tempfile::tempdir().unwrap();
    let measurements = write_measurements(dir.path(), "img", diameters_px);
    let metadata = write_metadata(dir.path(), "img", 1.0, None);
    ImageFixture {
        dir,
        measurements,
        metadata,
    }
}
