use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use vesicle_vsd::config::RunConfig;
use vesicle_vsd::export;
use vesicle_vsd::{LengthType, LengthUnit, Method, Sample};

#[derive(Parser, Debug)]
#[command(name = "vesicle-vsd")]
#[command(about = "Correct 2D vesicle section sizes into 3D vesicle size distributions")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a whole sample described by a JSON config.
    #[command(name = "run")]
    Run(RunArgs),
    /// Correct a single image and print the table as CSV.
    #[command(name = "correct")]
    Correct(CorrectArgs),
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    config: PathBuf,
    /// Overrides the config's output directory.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct CorrectArgs {
    /// Per-vesicle size table (CSV, tab-delimited or Parquet).
    measurements: PathBuf,
    /// Image metadata with the pixel scale (JSON or key=value).
    metadata: PathBuf,
    #[arg(long, default_value = "Saltikov")]
    method: String,
    /// radius or diameter; defaults to the method's classical choice.
    #[arg(long)]
    length_type: Option<LengthType>,
    #[arg(long, default_value_t = 12)]
    nbins: usize,
    #[arg(long, default_value_t = 0.0)]
    min_diameter: f64,
    #[arg(long, default_value = "um")]
    units: LengthUnit,
    /// Unit of the metadata pixel scale when the file does not state one.
    #[arg(long)]
    scale_units: Option<LengthUnit>,
    /// Write the CSV here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.cmd {
        Command::Run(args) => run(args),
        Command::Correct(args) => correct(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = RunConfig::load(&args.config)?;
    if let Some(out) = args.out {
        config.output_dir = out;
    }
    let sample = config.run()?;
    for path in export::write_sample(&sample, &config.output_dir)? {
        println!("{}", path.display());
    }
    Ok(())
}

fn correct(args: CorrectArgs) -> Result<()> {
    const KEY: &str = "vsd";

    let length_type = args.length_type.unwrap_or_else(|| {
        args.method
            .parse::<Method>()
            .map(Method::classical_length_type)
            .unwrap_or(LengthType::Diameter)
    });

    let mut sample = Sample::new("single", args.units);
    sample.add_image(
        "image",
        &args.measurements,
        &args.metadata,
        args.scale_units.unwrap_or(args.units),
        args.min_diameter,
    )?;
    let result = sample.apply_vsd_corr(KEY, &args.method, length_type, args.nbins)?;

    match args.out {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            export::write_result(file, KEY, result)?;
        }
        None => export::write_result(std::io::stdout().lock(), KEY, result)?,
    }
    Ok(())
}
