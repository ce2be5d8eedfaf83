use std::path::Path;

use clap::{Parser, Subcommand};
use foundation::ids::LayerId;
use serde_json::{Value, json};
use tiling::coord::{TileCoord, TileInfo};
use tools::{IndexSummary, TileSummary};
use tracing::info;
use tracing_subscriber::EnvFilter;
use worker::{LoadTileRequest, PoolConfig, WorkerOptions, WorkerPool};

const LAYER: LayerId = LayerId(0);

#[derive(Parser, Debug)]
#[command(author, version, about = "Builds vector tile geometry from GeoJSON")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build one tile and print a summary of its buffers
    Tile {
        /// GeoJSON file, or an http(s) URL to fetch
        #[arg(long)]
        data: String,

        /// Plugin style JSON file
        #[arg(long)]
        style: String,

        /// Tile address as z/x/y
        #[arg(long)]
        tile: TileCoord,

        /// Worker options JSON file (extent, tileSize, projection, ...)
        #[arg(long)]
        options: Option<String>,

        #[arg(long, default_value_t = 1.0)]
        gl_scale: f64,

        #[arg(long, default_value_t = 1.0)]
        z_scale: f64,

        /// Number of worker actors
        #[arg(long, default_value_t = 1)]
        workers: usize,
    },

    /// Index a GeoJSON source and print its extent and feature count
    Index {
        /// GeoJSON file, or an http(s) URL to fetch
        #[arg(long)]
        data: String,

        /// Worker options JSON file
        #[arg(long)]
        options: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Args::parse().command {
        Command::Tile {
            data,
            style,
            tile,
            options,
            gl_scale,
            z_scale,
            workers,
        } => {
            let mut opts = read_options(options.as_deref()).await?;
            opts.style = read_json(Path::new(&style)).await?;

            let pool = WorkerPool::new(PoolConfig {
                workers,
                ..PoolConfig::default()
            })?;
            pool.add_layer(LAYER, opts).await?;
            pool.set_data(LAYER, data_input(&data).await?).await?;

            let request = LoadTileRequest {
                tile_info: TileInfo {
                    z: tile.z,
                    x: tile.x,
                    y: tile.y,
                    extent: None,
                },
                gl_scale,
                z_scale,
            };
            let out = pool.load_tile(LAYER, request).await?;
            let summary = TileSummary::of(tile.to_string(), &out);
            info!(plugins = summary.plugins.len(), bytes = summary.transfer_bytes, "tile built");

            let stats = pool.stats().await?;
            let report = json!({ "tile": summary, "stats": stats });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Index { data, options } => {
            let opts = read_options(options.as_deref()).await?;
            let pool = WorkerPool::new(PoolConfig {
                workers: 1,
                ..PoolConfig::default()
            })?;
            pool.add_layer(LAYER, opts).await?;
            let summary = pool.set_data(LAYER, data_input(&data).await?).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&IndexSummary::from(&summary))?
            );
        }
    }
    Ok(())
}

/// URLs are handed to the worker as-is; anything else is read as a file.
async fn data_input(arg: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if arg.starts_with("http://") || arg.starts_with("https://") {
        return Ok(Value::String(arg.to_string()));
    }
    read_json(Path::new(arg)).await
}

async fn read_options(path: Option<&str>) -> Result<WorkerOptions, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let text = tokio::fs::read_to_string(path).await?;
            Ok(WorkerOptions::from_json_str(&text)?)
        }
        None => Ok(WorkerOptions::default()),
    }
}

async fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {}: {e}", path.display()))?)
}
