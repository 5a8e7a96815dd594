// CLI entry for seed-mesh
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueHint};
use log::{info, warn};
use rust_voronoi_seeder::export;
use rust_voronoi_seeder::{
    DensityField, MeshSeeder, RelaxationWeights, SeederConfig, SeederConfigBuilder,
    SeedingResult,
};

#[derive(Parser, Debug)]
#[command(
    name = "seed-mesh",
    version,
    about = "Seed a masked 2D domain with quasi-uniform sites"
)]
struct Cli {
    /// Mask image; pixels with non-zero intensity are excluded
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output directory
    #[arg(short = 'o', long = "output", default_value = ".", value_hint = ValueHint::DirPath)]
    output: PathBuf,

    /// Number of sites
    #[arg(short = 'n', long = "sites", default_value_t = 1000)]
    sites: usize,
    /// Random samples per iteration
    #[arg(short = 'q', long = "samples", default_value_t = 100_000)]
    samples: usize,
    /// Relaxation iterations
    #[arg(short = 't', long = "iterations", default_value_t = 100)]
    iterations: usize,
    /// Master seed (random if omitted)
    #[arg(long = "seed")]
    seed: Option<u64>,

    /// Weight on the old position per exposure
    #[arg(long = "alpha1", default_value_t = 1.0)]
    alpha1: f64,
    /// Weight on the sample mean per exposure
    #[arg(long = "alpha2", default_value_t = 0.0)]
    alpha2: f64,
    /// Constant weight on the old position
    #[arg(long = "beta1", default_value_t = 0.0)]
    beta1: f64,
    /// Constant weight on the sample mean
    #[arg(long = "beta2", default_value_t = 1.0)]
    beta2: f64,

    /// Redistribute sites every this many iterations (0 disables)
    #[arg(long = "redistribute-every", default_value_t = 0)]
    redistribute_every: usize,
    /// Sites moved per redistribution
    #[arg(long = "redistribute-count", default_value_t = 0)]
    redistribute_count: usize,

    /// Periodic boundary along x
    #[arg(long = "periodic-x", action = ArgAction::SetTrue)]
    periodic_x: bool,
    /// Periodic boundary along y
    #[arg(long = "periodic-y", action = ArgAction::SetTrue)]
    periodic_y: bool,
    /// Domain bounds X0 X1 Y0 Y1 (default: unit width, image aspect)
    #[arg(long = "bounds", num_args = 4, value_names = ["X0", "X1", "Y0", "Y1"], allow_hyphen_values = true)]
    bounds: Option<Vec<f64>>,

    /// Output raster pixels per unit length
    #[arg(long = "resolution", default_value_t = 500)]
    resolution: usize,
    /// Write snapshots every this many iterations
    #[arg(long = "snapshot-every")]
    snapshot_every: Option<usize>,
    /// Also write label images
    #[arg(long = "save-image", action = ArgAction::SetTrue)]
    save_image: bool,
    /// Packing correction for volumes
    #[arg(long = "packing", default_value_t = 1.0)]
    packing: f64,
    /// Number of threads
    #[arg(long = "threads")]
    threads: Option<usize>,
}

fn build_config(cli: &Cli) -> rust_voronoi_seeder::Result<SeederConfig> {
    let mut builder = SeederConfigBuilder::new()
        .site_count(cli.sites)?
        .samples_per_iteration(cli.samples)?
        .iterations(cli.iterations)
        .weights(RelaxationWeights {
            alpha1: cli.alpha1,
            alpha2: cli.alpha2,
            beta1: cli.beta1,
            beta2: cli.beta2,
        })?
        .redistribution(cli.redistribute_every, cli.redistribute_count)?
        .periodic(cli.periodic_x, cli.periodic_y)
        .image_resolution(cli.resolution)
        .packing_efficiency(cli.packing);
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }
    if let Some(b) = cli.bounds.as_deref() {
        builder = builder.bounds(b[0], b[1], b[2], b[3])?;
    }
    if let Some(every) = cli.snapshot_every {
        builder = builder.snapshot_every(every);
    }
    if let Some(threads) = cli.threads {
        builder = builder.threads(threads);
    }
    builder.build()
}

/// Point file, histogram and optionally the label image for one result
fn write_result(
    dir: &Path,
    stem: &str,
    histogram: &str,
    result: &SeedingResult,
    save_image: bool,
) -> rust_voronoi_seeder::Result<()> {
    let points = dir.join(format!("{}.xyz", stem));
    export::write_points(BufWriter::new(File::create(&points)?), result.records())?;
    export::write_histogram(
        BufWriter::new(File::create(dir.join(histogram))?),
        result.rdf(),
    )?;
    if save_image {
        export::save_label_image(
            dir.join(format!("{}.png", stem)),
            result.raster(),
            result.positions(),
            result.domain(),
        )?;
    }
    info!("wrote {}", points.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = build_config(&cli).context("invalid configuration")?;

    let field = DensityField::open(&cli.input)
        .with_context(|| format!("failed to load mask {}", cli.input.display()))?;
    let free = field.free_fraction();
    if free == 0.0 {
        warn!("every pixel of {} is occupied; placement will fail", cli.input.display());
    } else {
        info!("{:.1}% of the mask is free", 100.0 * free);
    }
    let domain = config.domain_for(field.width(), field.height())?;
    let mask = field.into_mask(&domain);
    fs::create_dir_all(&cli.output)
        .with_context(|| format!("failed to create {}", cli.output.display()))?;

    info!("seed {}", config.seed);
    let mut seeder = MeshSeeder::new(config, domain, mask)?;
    let dir = cli.output.as_path();
    seeder.relax_with(|k, snapshot| {
        write_result(
            dir,
            &format!("alg1_{}", k),
            &format!("histogram_{}.hist", k),
            snapshot,
            cli.save_image,
        )
    })?;

    let result = seeder.finish()?;
    write_result(dir, "mesh", "histogram.hist", &result, cli.save_image)?;
    export::write_configuration(
        BufWriter::new(File::create(dir.join("configuration.cfg"))?),
        result.summary(),
    )?;

    info!(
        "{} sites, spacing {:.5e}, lattice {:?}",
        result.records().len(),
        result.spacing(),
        result.summary().lattice_points
    );
    Ok(())
}
