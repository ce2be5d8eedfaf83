use serde::Deserialize;
use serde_json::Value;
use tiling::coord::TileInfo;
use tiling::index::IndexOptions;

use crate::error::WorkerError;

/// Construction options of a layer worker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerOptions {
    pub extent: f64,
    pub tile_size: [f64; 2],
    pub simplify_tolerance: f64,
    pub tile_buffer: f64,
    pub has_altitude: bool,
    /// Projection code such as `EPSG:4326`; Web Mercator when absent.
    pub projection: Option<String>,
    /// Plugin styles, compiled when the worker is created.
    pub style: Value,
    /// Echo claimed features alongside the geometry.
    pub features: bool,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            extent: 8192.0,
            tile_size: [256.0, 256.0],
            simplify_tolerance: 3.0,
            tile_buffer: 64.0,
            has_altitude: false,
            projection: None,
            style: Value::Array(Vec::new()),
            features: false,
        }
    }
}

impl WorkerOptions {
    pub fn from_json_str(payload: &str) -> Result<Self, WorkerError> {
        serde_json::from_str(payload).map_err(|e| WorkerError::config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), WorkerError> {
        if !(self.extent.is_finite() && self.extent > 0.0) {
            return Err(WorkerError::config(format!("extent must be positive, got {}", self.extent)));
        }
        if !self.tile_size.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(WorkerError::config(format!(
                "tileSize must be positive, got {:?}",
                self.tile_size
            )));
        }
        Ok(())
    }

    pub fn index_options(&self) -> Result<IndexOptions, WorkerError> {
        let options = IndexOptions {
            buffer: self.tile_buffer,
            tolerance: self.simplify_tolerance,
            has_altitude: self.has_altitude,
            ..IndexOptions::default()
        };
        Ok(options.with_projection_code(self.projection.as_deref())?)
    }
}

/// One tile request. Unknown members of `tileInfo` (such as the tile's
/// screen `point`) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTileRequest {
    pub tile_info: TileInfo,
    #[serde(default = "unit_scale")]
    pub gl_scale: f64,
    #[serde(default = "unit_scale")]
    pub z_scale: f64,
}

fn unit_scale() -> f64 {
    1.0
}

impl LoadTileRequest {
    pub fn new(tile_info: TileInfo) -> Self {
        Self {
            tile_info,
            gl_scale: 1.0,
            z_scale: 1.0,
        }
    }
}
