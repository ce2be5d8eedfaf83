//! Tile feature sources.
//!
//! A [`GeoJsonSource`] owns the spatial index of one layer. `setData`
//! replaces the index wholesale: it is cleared first, and tile queries
//! against a missing index report [`WorkerError::LoadingPending`].

use std::collections::BTreeMap;

use formats::feature::TileFeature;
use formats::geojson::SourceData;
use foundation::bounds::Aabb2;
use foundation::ids::FeatureId;
use serde::Serialize;
use serde_json::{Map, Value};
use tiling::coord::TileCoord;
use tiling::index::{GeoJsonIndex, IndexOptions};
use tracing::{debug, info};

use crate::error::WorkerError;

/// Supplier of the features intersecting a tile, in tile-local coordinates.
pub trait TileSource: Send {
    fn tile_features(&self, coord: TileCoord, extent: f64) -> Result<Vec<TileFeature>, WorkerError>;
}

/// Result of a successful `setData`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSummary {
    /// `[min_lon, min_lat, max_lon, max_lat]`; `None` for data without coordinates.
    pub extent: Option<[f64; 4]>,
    pub id_map: BTreeMap<FeatureId, Map<String, Value>>,
}

impl DataSummary {
    fn from_source(data: &SourceData, bounds: Aabb2) -> Self {
        Self {
            extent: (!bounds.is_empty()).then(|| bounds.to_array()),
            id_map: data.id_map(),
        }
    }
}

/// Where `setData` reads its features from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataInput {
    Inline(Value),
    Remote(RemoteRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

impl DataInput {
    /// Interprets a `setData` argument.
    ///
    /// Strings that look like JSON are parsed as GeoJSON, other strings are
    /// URLs. An object with a `url` and no `type` is a remote request whose
    /// optional `headers` are sent with it; `jsonp` is not supported and is
    /// ignored. Anything else is inline GeoJSON.
    pub fn parse(value: Value) -> Result<Self, WorkerError> {
        match value {
            Value::String(text) => {
                let trimmed = text.trim_start();
                if trimmed.starts_with('{') || trimmed.starts_with('[') {
                    let parsed = serde_json::from_str(trimmed)
                        .map_err(|e| WorkerError::data_source(format!("invalid GeoJSON: {e}")))?;
                    Ok(DataInput::Inline(parsed))
                } else {
                    Ok(DataInput::Remote(RemoteRequest {
                        url: text.trim().to_string(),
                        headers: BTreeMap::new(),
                    }))
                }
            }
            Value::Object(ref obj) if obj.get("type").is_none() && obj.contains_key("url") => {
                let url = obj
                    .get("url")
                    .and_then(Value::as_str)
                    .ok_or_else(|| WorkerError::data_source("url must be a string"))?
                    .to_string();
                let headers = match obj.get("headers") {
                    None | Some(Value::Null) => BTreeMap::new(),
                    Some(Value::Object(h)) => h
                        .iter()
                        .map(|(k, v)| match v {
                            Value::String(s) => Ok((k.clone(), s.clone())),
                            other => Err(WorkerError::data_source(format!(
                                "header {k} must be a string, got {other}"
                            ))),
                        })
                        .collect::<Result<_, _>>()?,
                    Some(_) => return Err(WorkerError::data_source("headers must be an object")),
                };
                Ok(DataInput::Remote(RemoteRequest { url, headers }))
            }
            other => Ok(DataInput::Inline(other)),
        }
    }
}

/// Downloads a GeoJSON document.
pub async fn fetch_geojson(
    client: &reqwest::Client,
    request: &RemoteRequest,
) -> Result<Value, WorkerError> {
    let mut req = client.get(&request.url);
    for (name, value) in &request.headers {
        req = req.header(name.as_str(), value.as_str());
    }

    let resp = req
        .send()
        .await
        .map_err(|e| WorkerError::data_source(format!("request to {} failed: {e}", request.url)))?;
    if !resp.status().is_success() {
        return Err(WorkerError::data_source(format!(
            "HTTP error {} from {}",
            resp.status(),
            request.url
        )));
    }
    resp.json::<Value>()
        .await
        .map_err(|e| WorkerError::data_source(format!("invalid GeoJSON from {}: {e}", request.url)))
}

/// Indexed GeoJSON features of one layer.
#[derive(Debug)]
pub struct GeoJsonSource {
    options: IndexOptions,
    index: Option<GeoJsonIndex>,
    generation: u64,
}

impl GeoJsonSource {
    pub fn new(options: IndexOptions) -> Self {
        Self {
            options,
            index: None,
            generation: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.index.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drops the current index and starts a new data generation.
    pub fn begin_load(&mut self) -> u64 {
        self.index = None;
        self.generation += 1;
        self.generation
    }

    /// Indexes `value` if `generation` is still the latest one.
    ///
    /// Returns `None` for a superseded generation; its data is discarded.
    pub fn finish_load(
        &mut self,
        generation: u64,
        value: Result<Value, WorkerError>,
    ) -> Option<Result<DataSummary, WorkerError>> {
        if generation != self.generation {
            debug!(generation, current = self.generation, "discarding stale data");
            return None;
        }
        let result = value.and_then(|v| {
            let (index, data) = GeoJsonIndex::from_geojson(&v, self.options)?;
            let summary = DataSummary::from_source(&data, index.lon_lat_bounds());
            info!(features = index.len(), generation, "indexed GeoJSON data");
            self.index = Some(index);
            Ok(summary)
        });
        Some(result)
    }

    /// Replaces the data with an inline GeoJSON value.
    pub fn set_inline(&mut self, value: Value) -> Result<DataSummary, WorkerError> {
        let generation = self.begin_load();
        self.finish_load(generation, Ok(value))
            .unwrap_or_else(|| Err(WorkerError::data_source("data load superseded")))
    }
}

impl TileSource for GeoJsonSource {
    fn tile_features(&self, coord: TileCoord, extent: f64) -> Result<Vec<TileFeature>, WorkerError> {
        let index = self.index.as_ref().ok_or(WorkerError::LoadingPending)?;
        Ok(index.get_tile(coord, extent))
    }
}
