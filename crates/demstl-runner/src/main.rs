//! `demstl`: convert MERIT DEM tiles into printable STL terrain.

use clap::{ArgAction, Args, Parser, Subcommand};
use demstl_runner::{
    format_report, list_tiles, report_json, run_generate, run_init, run_load_db, BoundsOverride,
    JobConfig, Result,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "demstl")]
#[command(version, about = "Convert MERIT DEM tiles into printable STL terrain", long_about = None)]
struct Cli {
    /// More logging (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate an STL file for the job's area
    Generate(GenerateArgs),
    /// Spool raw DEM samples for the job's area into SQLite
    LoadDb(LoadDbArgs),
    /// List available DEM tiles
    Tiles(TilesArgs),
    /// Write a job file with default settings
    Init(InitArgs),
}

#[derive(Args, Default)]
struct BoundsArgs {
    /// Northern latitude of the area
    #[arg(long, allow_hyphen_values = true)]
    north: Option<f64>,
    /// Southern latitude of the area
    #[arg(long, allow_hyphen_values = true)]
    south: Option<f64>,
    /// Eastern longitude of the area
    #[arg(long, allow_hyphen_values = true)]
    east: Option<f64>,
    /// Western longitude of the area
    #[arg(long, allow_hyphen_values = true)]
    west: Option<f64>,
}

impl BoundsArgs {
    fn to_override(&self) -> BoundsOverride {
        BoundsOverride {
            north: self.north,
            south: self.south,
            east: self.east,
            west: self.west,
        }
    }
}

#[derive(Args)]
struct GenerateArgs {
    /// Job file
    #[arg(short, long)]
    config: PathBuf,
    /// STL file to write
    #[arg(short, long)]
    output: PathBuf,
    /// Override the DEM tile directory
    #[arg(long)]
    dem_dir: Option<PathBuf>,
    /// Override the land boundary KML
    #[arg(long)]
    land: Option<PathBuf>,
    /// Override the grid resolution
    #[arg(long)]
    resolution: Option<f64>,
    #[command(flatten)]
    bounds: BoundsArgs,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct LoadDbArgs {
    /// Job file
    #[arg(short, long)]
    config: PathBuf,
    /// Override the working database path
    #[arg(long)]
    database: Option<PathBuf>,
}

#[derive(Args)]
struct TilesArgs {
    /// DEM tile directory
    #[arg(long, default_value = "dem")]
    dem_dir: PathBuf,
    #[command(flatten)]
    bounds: BoundsArgs,
}

#[derive(Args)]
struct InitArgs {
    /// Job file to create
    #[arg(short, long, default_value = "job.yaml")]
    output: PathBuf,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn generate(args: GenerateArgs) -> Result<()> {
    let mut job = JobConfig::load(&args.config)?;
    if let Some(dir) = args.dem_dir {
        job.dem_directory = dir;
    }
    if let Some(land) = args.land {
        job.land_boundaries = Some(land);
    }
    if let Some(resolution) = args.resolution {
        job.extract.resolution = resolution;
    }
    job.extract.bounds = args.bounds.to_override().apply(job.extract.bounds)?;

    let report = run_generate(&job, &args.output)?;
    if args.json {
        println!("{}", report_json(&report)?);
    } else {
        println!("{}", format_report(&report));
    }
    Ok(())
}

fn load_db(args: LoadDbArgs) -> Result<()> {
    let job = JobConfig::load(&args.config)?;
    let database = args.database.unwrap_or_else(|| job.working_database.clone());
    let report = run_load_db(&job, &database)?;
    println!(
        "Spooled {} samples from {} tile(s) into {}",
        report.samples,
        report.tiles_loaded,
        database.display()
    );
    for failure in &report.failures {
        println!("  failed {}: {}", failure.path.display(), failure.message);
    }
    Ok(())
}

fn tiles(args: TilesArgs) -> Result<()> {
    let area = args.bounds.to_override().apply(None)?;
    let tiles = list_tiles(&args.dem_dir, area.as_ref())?;
    for tile in &tiles {
        let b = tile.bounds();
        println!(
            "{}  N {:.4}  S {:.4}  E {:.4}  W {:.4}",
            tile.name(),
            b.north,
            b.south,
            b.east,
            b.west
        );
    }
    println!("{} tile(s)", tiles.len());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Generate(args) => generate(args),
        Command::LoadDb(args) => load_db(args),
        Command::Tiles(args) => tiles(args),
        Command::Init(args) => run_init(&args.output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "demstl", "-v", "generate", "-c", "job.yaml", "-o", "out.stl", "--west", "-85.5",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.config, PathBuf::from("job.yaml"));
        assert_eq!(args.bounds.west, Some(-85.5));
        assert_eq!(args.bounds.north, None);
        assert!(args.json);
    }

    #[test]
    fn test_parse_tiles_defaults() {
        let cli = Cli::try_parse_from(["demstl", "tiles"]).unwrap();
        let Command::Tiles(args) = cli.command else {
            panic!("expected tiles");
        };
        assert_eq!(args.dem_dir, PathBuf::from("dem"));
        assert!(args.bounds.to_override().is_empty());
    }
}
