//! Summaries printed by the `tilebuild` command line tool.

use foundation::buffer::TypedArray;
use serde::Serialize;
use worker::{DataSummary, GeometryBuffers, TileOutput};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArraySummary {
    pub len: usize,
    pub element_type: &'static str,
}

impl ArraySummary {
    fn of(array: &TypedArray) -> Self {
        Self {
            len: array.len(),
            element_type: array.element_type().name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowSummary {
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub indices: ArraySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSummary {
    pub plugin: usize,
    pub features_claimed: usize,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub indices: ArraySummary,
    pub indexes: ArraySummary,
    pub normals: bool,
    pub uvs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_volume: Option<ShadowSummary>,
}

impl PluginSummary {
    fn of(plugin: usize, data: &GeometryBuffers, feature_index: &TypedArray) -> Self {
        Self {
            plugin,
            features_claimed: feature_index.len() / 2,
            vertex_count: data.vertices.len() / 3,
            triangle_count: data.indices.len() / 3,
            indices: ArraySummary::of(&data.indices),
            indexes: ArraySummary::of(&data.indexes),
            normals: data.normals.is_some(),
            uvs: data.uvs.is_some(),
            shadow_volume: data.shadow_volume.as_ref().map(|sv| ShadowSummary {
                vertex_count: sv.vertices.len() / 3,
                triangle_count: sv.indices.len() / 3,
                indices: ArraySummary::of(&sv.indices),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileSummary {
    pub tile: String,
    pub plugins: Vec<PluginSummary>,
    pub geometry_errors: usize,
    pub transfer_buffers: usize,
    pub transfer_bytes: usize,
}

impl TileSummary {
    pub fn of(tile: impl Into<String>, out: &TileOutput) -> Self {
        Self {
            tile: tile.into(),
            plugins: out
                .payload
                .data
                .iter()
                .map(|(&plugin, output)| PluginSummary::of(plugin, &output.data, &output.feature_index))
                .collect(),
            geometry_errors: out.report.geometry_errors,
            transfer_buffers: out.transfer.len(),
            transfer_bytes: out.transfer.iter().map(|b| b.byte_len()).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub extent: Option<[f64; 4]>,
    pub feature_count: usize,
}

impl From<&DataSummary> for IndexSummary {
    fn from(summary: &DataSummary) -> Self {
        Self {
            extent: summary.extent,
            feature_count: summary.id_map.len(),
        }
    }
}
