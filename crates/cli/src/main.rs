mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shoebox_core::{Pipeline, PipelineConfig};

/// Shoebox — photo deduplication and person clustering pipeline
#[derive(Parser)]
#[command(name = "shoebox", version, about)]
struct Cli {
    /// Path to the catalog database
    #[arg(long, default_value_t = default_catalog_path())]
    catalog: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a directory of photos: dedup, face clustering, validation
    Ingest {
        /// Directory to ingest
        dir: PathBuf,
        /// Photos per batch
        #[arg(long)]
        batch_size: Option<usize>,
        /// Maximum Hamming distance for a perceptual duplicate
        #[arg(long)]
        perceptual_threshold: Option<u32>,
        /// Store originals and derivatives under this directory
        #[arg(long)]
        media_dir: Option<PathBuf>,
    },
    /// Show catalog status summary
    Status,
    /// List ingested photos and the persons found in each
    Photos,
    /// List discovered persons and their photo counts
    Persons,
    /// List duplicate links
    Duplicates,
}

fn default_catalog_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".shoebox")
        .join("catalog.db")
        .to_string_lossy()
        .to_string()
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let catalog_path = PathBuf::from(&cli.catalog);

    match cli.command {
        Commands::Ingest {
            dir,
            batch_size,
            perceptual_threshold,
            media_dir,
        } => {
            let mut config = PipelineConfig::default();
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            if let Some(threshold) = perceptual_threshold {
                config.perceptual_threshold = threshold;
            }
            config.media_dir = media_dir;

            let mut pipeline = Pipeline::open(&catalog_path, config)?;
            commands::ingest::run(&mut pipeline, &dir)?;
        }
        Commands::Status => {
            let pipeline = Pipeline::open(&catalog_path, PipelineConfig::default())?;
            commands::status::run(&pipeline)?;
        }
        Commands::Photos => {
            let pipeline = Pipeline::open(&catalog_path, PipelineConfig::default())?;
            commands::photos::run(&pipeline)?;
        }
        Commands::Persons => {
            let pipeline = Pipeline::open(&catalog_path, PipelineConfig::default())?;
            commands::persons::run(&pipeline)?;
        }
        Commands::Duplicates => {
            let pipeline = Pipeline::open(&catalog_path, PipelineConfig::default())?;
            commands::duplicates::run(&pipeline)?;
        }
    }

    Ok(())
}
