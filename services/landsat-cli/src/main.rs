//! Operator CLI for the Landsat imagery core.
//!
//! - `sql`: catalog SQL for a filter message
//! - `wrs`: WRS-2 cells under a geographic box
//! - `utm`: UTM EPSG code of a coordinate
//! - `vrt`: mount scenes, reconcile their bands and print or compose the result

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use landsat_common::{BoundingBox, LandsatConfig};
use raster::GdalEngine;
use storage::GcsFuseAdapter;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use commands::VrtOptions;

#[derive(Parser, Debug)]
#[command(name = "landsat")]
#[command(about = "Landsat catalog queries and band composition")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// YAML configuration file (defaults to LANDSAT_* environment variables)
    #[arg(long, env = "LANDSAT_CONFIG", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the catalog SQL for a filter message
    Sql {
        /// Path to the filter message (JSON)
        #[arg(short, long)]
        filter: PathBuf,

        /// Override the row limit
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List WRS-2 path/rows intersecting a geographic box
    Wrs {
        /// "west,south,east,north" in degrees
        #[arg(short, long, allow_hyphen_values = true)]
        bbox: String,
    },

    /// Print the UTM EPSG code for a coordinate
    Utm {
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
    },

    /// Mount scenes and print the VRT, or compose them into a GeoTIFF
    Vrt {
        /// Scene message (JSON); repeat for a multi-scene composition
        #[arg(short, long, required = true)]
        scene: Vec<PathBuf>,

        /// Comma separated bands, by name or number
        #[arg(short, long, value_delimiter = ',', default_value = "red,green,blue")]
        bands: Vec<String>,

        /// Clip envelope "minx,miny,maxx,maxy"
        #[arg(long, allow_hyphen_values = true)]
        bbox: Option<String>,

        /// CRS of the envelope (defaults to WGS 84)
        #[arg(long)]
        bbox_crs: Option<String>,

        /// Output data type, e.g. Byte or Float32
        #[arg(long)]
        output_type: Option<String>,

        /// Output pixel size in CRS units
        #[arg(long)]
        resolution: Option<f64>,

        /// Compose into this file instead of printing the VRT
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(args: &GlobalArgs) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn load_config(args: &GlobalArgs) -> Result<LandsatConfig> {
    let config = match &args.config {
        Some(path) => LandsatConfig::from_yaml_file(path)?,
        None => LandsatConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.global)?;
    let config = load_config(&cli.global)?;

    match cli.command {
        Commands::Sql { filter, limit } => {
            println!("{}", commands::sql(&config, &filter, limit)?);
        }
        Commands::Wrs { bbox } => {
            let Some(path) = &config.wrs_geojson else {
                bail!("LANDSAT_WRS_GEOJSON is not set");
            };
            let geometry = catalog::wrs::init_from_file(path)?;
            let bbox = BoundingBox::parse(&bbox)?;
            for path_row in commands::wrs(&geometry, &bbox)? {
                println!("{}", path_row);
            }
        }
        Commands::Utm { lon, lat } => {
            println!("{}", commands::utm(lon, lat)?);
        }
        Commands::Vrt {
            scene,
            bands,
            bbox,
            bbox_crs,
            output_type,
            resolution,
            output,
        } => {
            let options = VrtOptions {
                scenes: scene,
                bands,
                bbox: bbox.as_deref().map(BoundingBox::parse).transpose()?,
                bbox_crs,
                output_type,
                resolution,
                output,
            };

            let manager = storage::init(Arc::new(GcsFuseAdapter::from_config(&config)));
            let engine = Arc::new(GdalEngine::from_config(&config)?);
            info!(scenes = options.scenes.len(), "Building composition");

            let result = commands::vrt(&config, manager, engine, &options);
            storage::shutdown();
            println!("{}", result?);
        }
    }

    Ok(())
}
