//! Bulk import of tags and ingredients from JSON fixtures

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::database::{DatabaseConfig, init_pool, run_migrations};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use foodgram_api::{
    MIGRATOR,
    repositories::{IngredientRepository, TagRepository},
    validation::{validate_ingredient, validate_tag},
};

/// Load reference data into the Foodgram database
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Overrides DATABASE_URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import `[{"name": .., "measurement_unit": ..}]`
    Ingredients {
        /// JSON file to read
        path: PathBuf,
    },
    /// Import `[{"name": .., "slug": ..}]`
    Tags {
        /// JSON file to read
        path: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
struct IngredientRecord {
    name: String,
    measurement_unit: String,
}

#[derive(Debug, Deserialize)]
struct TagRecord {
    name: String,
    slug: String,
}

async fn read_records<T: for<'de> Deserialize<'de>>(path: &PathBuf) -> Result<Vec<T>> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut db_config = DatabaseConfig::from_env()?;
    if let Some(url) = args.database_url {
        db_config.database_url = url;
    }
    let pool = init_pool(&db_config).await?;
    run_migrations(&pool, &MIGRATOR).await?;

    match args.command {
        Command::Ingredients { path } => {
            let records: Vec<IngredientRecord> = read_records(&path).await?;
            let total = records.len();
            let rows: Vec<(String, String)> = records
                .into_iter()
                .filter_map(|record| {
                    let name = record.name.trim().to_string();
                    let unit = record.measurement_unit.trim().to_string();
                    match validate_ingredient(&name, &unit) {
                        Ok(()) => Some((name, unit)),
                        Err(e) => {
                            warn!("Skipping ingredient {:?}: {}", record.name, e);
                            None
                        }
                    }
                })
                .collect();

            let inserted = IngredientRepository::new(pool).insert_many(&rows).await?;
            info!(
                "Loaded {} new ingredients from {} ({} records)",
                inserted,
                path.display(),
                total
            );
        }
        Command::Tags { path } => {
            let records: Vec<TagRecord> = read_records(&path).await?;
            let total = records.len();
            let rows: Vec<(String, String)> = records
                .into_iter()
                .filter_map(|record| match validate_tag(record.name.trim(), &record.slug) {
                    Ok(()) => Some((record.name.trim().to_string(), record.slug)),
                    Err(e) => {
                        warn!("Skipping tag {:?}: {}", record.name, e);
                        None
                    }
                })
                .collect();

            let inserted = TagRepository::new(pool).insert_many(&rows).await?;
            info!(
                "Loaded {} new tags from {} ({} records)",
                inserted,
                path.display(),
                total
            );
        }
    }

    Ok(())
}
