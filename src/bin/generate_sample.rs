use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde_json::json;

/// Write a synthetic sectioned vesicle population plus a run config.
#[derive(Parser, Debug)]
#[command(name = "generate_sample")]
struct Cli {
    #[arg(long, default_value = "synthetic_sample")]
    out: PathBuf,
    #[arg(long, default_value_t = 3)]
    images: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Vesicles per cubic micrometre.
    #[arg(long, default_value_t = 2e-5)]
    number_density: f64,
    /// Median vesicle diameter, micrometres.
    #[arg(long, default_value_t = 40.0)]
    median_diameter: f64,
    /// Log-normal shape parameter.
    #[arg(long, default_value_t = 0.45)]
    sigma: f64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn log_normal(&mut self, median: f64, sigma: f64) -> f64 {
        median * self.gauss(0.0, sigma).exp()
    }
}

const WIDTH_PX: u32 = 2048;
const HEIGHT_PX: u32 = 1536;
const SCALE_UM: f64 = 0.8;

/// Section diameters (µm) from cutting a random sphere population with z = 0.
///
/// Sphere centres fill a slab of half-thickness `max_radius` around the
/// plane; a sphere of radius `r` at height `z` leaves a section of
/// diameter `2·sqrt(r² − z²)` when `|z| < r`.
fn section_image(rng: &mut SimpleRng, cli: &Cli, area: f64) -> Vec<f64> {
    let max_radius = cli.median_diameter * (4.0 * cli.sigma).exp() / 2.0;
    let slab_volume = area * 2.0 * max_radius;
    let n_spheres = (cli.number_density * slab_volume).round() as usize;

    (0..n_spheres)
        .filter_map(|_| {
            let r = (rng.log_normal(cli.median_diameter, cli.sigma) / 2.0).min(max_radius);
            let z = (rng.next_f64() * 2.0 - 1.0) * max_radius;
            (z.abs() < r).then(|| 2.0 * (r * r - z * z).sqrt())
        })
        .collect()
}

fn write_image(dir: &Path, name: &str, sections_um: &[f64]) -> Result<()> {
    let csv_path = dir.join(format!("{name}.csv"));
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("creating {}", csv_path.display()))?;
    writer.write_record(["Label", "Diameter"])?;
    for (i, d) in sections_um.iter().enumerate() {
        writer.write_record([format!("{name}-{i}"), format!("{:.3}", d / SCALE_UM)])?;
    }
    writer.flush()?;

    let meta_path = dir.join(format!("{name}.json"));
    let meta = json!({
        "scale": SCALE_UM,
        "unit": "um",
        "width": WIDTH_PX,
        "height": HEIGHT_PX,
    });
    std::fs::write(&meta_path, serde_json::to_string_pretty(&meta)?)
        .with_context(|| format!("writing {}", meta_path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.out).with_context(|| format!("creating {}", cli.out.display()))?;

    let mut rng = SimpleRng::new(cli.seed);
    let area = WIDTH_PX as f64 * HEIGHT_PX as f64 * SCALE_UM * SCALE_UM;

    let mut images = Vec::new();
    let mut total = 0;
    for i in 0..cli.images {
        let name = format!("img{:02}", i + 1);
        let sections = section_image(&mut rng, &cli, area);
        info!("{name}: {} sections", sections.len());
        total += sections.len();
        write_image(&cli.out, &name, &sections)?;
        images.push(json!({
            "id": name,
            "measurements": format!("{name}.csv"),
            "metadata": format!("{name}.json"),
        }));
    }

    let config = json!({
        "sample_id": "synthetic",
        "units": "um",
        "min_diameter": 5.0,
        "images": images,
        "corrections": [
            { "key": "saltikov", "method": "Saltikov", "length_type": "diameter", "nbins": 12 },
            { "key": "cheng_lemlich", "method": "ChengLemlich", "length_type": "radius", "nbins": 12 },
            { "key": "sahagian", "method": "SahagianProussevitch", "length_type": "diameter", "nbins": 12 }
        ],
        "output_dir": "vsd_output",
    });
    let config_path = cli.out.join("config.json");
    let mut file = std::fs::File::create(&config_path)
        .with_context(|| format!("creating {}", config_path.display()))?;
    file.write_all(serde_json::to_string_pretty(&config)?.as_bytes())?;

    println!(
        "Wrote {} images ({total} sections, true N_V = {:e} per um^3) to {}",
        cli.images,
        cli.number_density,
        cli.out.display()
    );
    Ok(())
}
