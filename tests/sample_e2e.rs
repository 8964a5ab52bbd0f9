mod common;

use approx::assert_relative_eq;
use common::{image_fixture, write_measurements, write_metadata};
use vesicle_vsd::config::RunConfig;
use vesicle_vsd::export;
use vesicle_vsd::{LengthType, LengthUnit, Method, Sample, VsdError};

#[test]
fn threshold_and_binning_scenario() {
    let fx = image_fixture(&[10.0, 12.0, 20.0, 21.0, 22.0, 40.0]);
    let mut sample = Sample::new("scenario", LengthUnit::Micrometers);
    let table = sample
        .add_image(
            "img",
            &fx.measurements,
            &fx.metadata,
            LengthUnit::Micrometers,
            15.0,
        )
        .unwrap();
    assert_eq!(table.values(), &[20.0, 21.0, 22.0, 40.0]);

    let result = sample
        .apply_vsd_corr("sp", "SahagianProussevitch", LengthType::Diameter, 2)
        .unwrap();
    assert_eq!(result.histogram.edges.edges(), &[0.0, 20.0, 40.0]);
    // 20 sits on the interior edge and belongs to [0, 20].
    assert_eq!(result.histogram.counts, vec![1, 3]);
}

#[test]
fn same_key_is_overwritten() {
    let diameters: Vec<f64> = (0..200).map(|i| 5.0 + (i % 37) as f64 * 1.7).collect();
    let fx = image_fixture(&diameters);
    let mut sample = Sample::new("overwrite", LengthUnit::Micrometers);
    sample
        .add_image("img", &fx.measurements, &fx.metadata, LengthUnit::Micrometers, 0.0)
        .unwrap();

    sample
        .apply_vsd_corr("s", "Saltikov", LengthType::Diameter, 12)
        .unwrap();
    sample
        .apply_vsd_corr("s", "Saltikov", LengthType::Diameter, 7)
        .unwrap();

    assert_eq!(sample.results().count(), 1);
    let stored = sample.result("s").unwrap();
    assert_eq!(stored.table.nbins, 7);
    assert_eq!(stored.histogram.total(), 200);
}

#[test]
fn duplicate_image_and_unknown_method_are_reported() {
    let fx = image_fixture(&[30.0, 40.0]);
    let mut sample = Sample::new("errors", LengthUnit::Micrometers);
    sample
        .add_image("img", &fx.measurements, &fx.metadata, LengthUnit::Micrometers, 0.0)
        .unwrap();

    let dup = sample
        .add_image("img", &fx.measurements, &fx.metadata, LengthUnit::Micrometers, 0.0)
        .unwrap_err();
    assert!(matches!(dup, VsdError::DuplicateImageId { .. }));
    assert!(dup.to_string().contains("'img'"));

    let unknown = sample
        .apply_vsd_corr("k", "Schwartz", LengthType::Diameter, 4)
        .unwrap_err();
    assert!(unknown.to_string().contains("Schwartz"));
    assert_eq!(sample.results().count(), 0);
}

#[test]
fn missing_file_is_a_load_error() {
    let fx = image_fixture(&[30.0]);
    let mut sample = Sample::new("io", LengthUnit::Micrometers);
    let err = sample
        .add_image(
            "img",
            &fx.dir.path().join("absent.csv"),
            &fx.metadata,
            LengthUnit::Micrometers,
            0.0,
        )
        .unwrap_err();
    assert!(matches!(err, VsdError::Load { .. }));
    assert_eq!(sample.image_count(), 0);
}

#[test]
fn images_are_aggregated_over_their_total_area() {
    let dir = tempfile::tempdir().unwrap();
    let a_csv = write_measurements(dir.path(), "a", &[10.0, 20.0, 30.0]);
    let a_meta = write_metadata(dir.path(), "a", 2.0, Some((100, 100)));
    let b_csv = write_measurements(dir.path(), "b", &[25.0, 50.0]);
    let b_meta = write_metadata(dir.path(), "b", 2.0, Some((100, 50)));

    let mut sample = Sample::new("agg", LengthUnit::Micrometers);
    sample
        .add_image("a", &a_csv, &a_meta, LengthUnit::Micrometers, 0.0)
        .unwrap();
    sample
        .add_image("b", &b_csv, &b_meta, LengthUnit::Micrometers, 0.0)
        .unwrap();

    let merged = sample.aggregated(LengthType::Diameter).unwrap();
    assert_eq!(merged.len(), 5);
    assert_eq!(merged.image_count, 2);
    assert_relative_eq!(merged.area.unwrap(), 40_000.0 + 20_000.0);

    let result = sample
        .apply_vsd_corr("cl", "ChengLemlich", LengthType::Radius, 5)
        .unwrap();
    assert_relative_eq!(result.normalisation_area, 60_000.0);
    assert_relative_eq!(result.histogram.edges.max(), 50.0);
    assert_eq!(result.table.method, Method::ChengLemlich);
}

#[test]
fn synthetic_population_is_recovered_in_magnitude() {
    // Monodisperse spheres of diameter 40 µm at N_V = 1e-5 µm⁻³ cut by a
    // plane give N_A = N_V · D sections per µm², with section diameters
    // distributed as d / (D · sqrt(D² − d²)).
    let n_v = 1e-5;
    let diameter = 40.0;
    let area = 4.0e6;
    let n_sections = (n_v * diameter * area) as usize;
    let sections: Vec<f64> = (0..n_sections)
        .map(|k| {
            // Inverse CDF of the section-diameter distribution at stratified quantiles.
            let u = (k as f64 + 0.5) / n_sections as f64;
            diameter * (1.0 - (1.0 - u).powi(2)).sqrt()
        })
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let csv = write_measurements(dir.path(), "mono", &sections);
    let meta = write_metadata(dir.path(), "mono", 1.0, Some((2000, 2000)));
    let mut sample = Sample::new("mono", LengthUnit::Micrometers);
    sample
        .add_image("mono", &csv, &meta, LengthUnit::Micrometers, 0.0)
        .unwrap();

    for method in Method::ALL {
        let key = method.name();
        let result = sample
            .apply_vsd_corr(key, key, LengthType::Diameter, 10)
            .unwrap();
        let total = result.table.total_number_density();
        assert!(
            (total - n_v).abs() / n_v < 0.35,
            "{key}: total N_V {total:e} far from {n_v:e}"
        );
    }
}

#[test]
fn config_run_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let diameters: Vec<f64> = (0..120).map(|i| 4.0 + (i % 23) as f64 * 2.5).collect();
    write_measurements(dir.path(), "a", &diameters);
    write_metadata(dir.path(), "a", 1.0, Some((400, 300)));
    write_measurements(dir.path(), "tiny", &[1.0, 2.0]);
    write_metadata(dir.path(), "tiny", 1.0, Some((400, 300)));

    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        r#"{
            "sample_id": "cfg",
            "min_diameter": 5.0,
            "skip_empty_images": true,
            "images": [
                { "id": "a", "measurements": "a.csv", "metadata": "a.json" },
                { "id": "tiny", "measurements": "tiny.csv", "metadata": "tiny.json" }
            ],
            "corrections": [
                { "key": "salt", "method": "Saltikov", "nbins": 12 },
                { "key": "cl", "method": "Cheng-Lemlich", "nbins": 12 },
                { "key": "a_sp", "method": "sahagian", "nbins": 8, "image": "a" }
            ],
            "output_dir": "out"
        }"#,
    )
    .unwrap();

    let config = RunConfig::load(&config_path).unwrap();
    let sample = config.run().unwrap();
    assert_eq!(sample.image_count(), 1);
    assert_eq!(sample.results().count(), 3);
    assert_eq!(
        sample.result("cl").unwrap().table.length_type,
        LengthType::Radius
    );

    let written = export::write_sample(&sample, &config.output_dir).unwrap();
    assert_eq!(written.len(), 4);
    assert!(dir.path().join("out").join("cfg_salt.csv").exists());
}
