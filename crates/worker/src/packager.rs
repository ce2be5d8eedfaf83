//! Packaging of built geometry into transferable tile output.
//!
//! Every typed array placed in the payload has its backing buffer listed
//! exactly once in the transfer list. Buffers left off the list would be
//! copied instead of moved across the worker boundary.

use std::collections::{BTreeMap, HashSet};

use formats::feature::{GeometryType, TileFeature};
use foundation::buffer::{ArrayBuffer, BufferId, TypedArray};
use foundation::ids::FeatureId;
use foundation::index_type::IndexBuffer;
use geometry::faces::Faces;
use serde::Serialize;
use serde_json::{Map, Value};
use style::marker::StyleMarks;

use crate::error::WorkerError;

/// Buffers to move to the receiver, without duplicates.
#[derive(Debug, Default, Clone)]
pub struct TransferList {
    buffers: Vec<ArrayBuffer>,
    seen: HashSet<BufferId>,
}

impl TransferList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists the buffer behind `array` unless it is already listed.
    pub fn push(&mut self, array: &TypedArray) {
        let buffer = array.buffer();
        if self.seen.insert(buffer.id()) {
            self.buffers.push(buffer.clone());
        }
    }

    pub fn contains(&self, id: BufferId) -> bool {
        self.seen.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.buffers.iter().map(ArrayBuffer::byte_len).sum()
    }

    pub fn into_vec(self) -> Vec<ArrayBuffer> {
        self.buffers
    }
}

#[derive(Debug, Clone)]
pub struct ShadowVolumeBuffers {
    pub vertices: TypedArray,
    pub indices: TypedArray,
    pub indexes: TypedArray,
}

#[derive(Debug, Clone)]
pub struct GeometryBuffers {
    pub vertices: TypedArray,
    pub indices: TypedArray,
    pub indexes: TypedArray,
    pub normals: Option<TypedArray>,
    pub uvs: Option<TypedArray>,
    pub shadow_volume: Option<ShadowVolumeBuffers>,
}

impl GeometryBuffers {
    fn from_faces(faces: Faces) -> Self {
        Self {
            vertices: TypedArray::from_f32(&faces.vertices),
            indices: faces.indices.into_typed_array(),
            indexes: faces.indexes.into_typed_array(),
            normals: faces.normals.as_deref().map(TypedArray::from_f32),
            uvs: faces.uvs.as_deref().map(TypedArray::from_f32),
            shadow_volume: faces.shadow_volume.map(|sv| ShadowVolumeBuffers {
                vertices: TypedArray::from_f32(&sv.vertices),
                indices: sv.indices.into_typed_array(),
                indexes: sv.indexes.into_typed_array(),
            }),
        }
    }

    /// Every typed array of this geometry.
    pub fn arrays(&self) -> Vec<&TypedArray> {
        let mut out = vec![&self.vertices, &self.indices, &self.indexes];
        out.extend(self.normals.iter());
        out.extend(self.uvs.iter());
        if let Some(sv) = &self.shadow_volume {
            out.extend([&sv.vertices, &sv.indices, &sv.indexes]);
        }
        out
    }
}

/// Output of one plugin.
#[derive(Debug, Clone)]
pub struct PluginOutput {
    pub data: GeometryBuffers,
    /// Interleaved `(feature ordinal, style index)` pairs of the plugin's claims.
    pub feature_index: TypedArray,
}

impl PluginOutput {
    pub fn arrays(&self) -> Vec<&TypedArray> {
        let mut out = self.data.arrays();
        out.push(&self.feature_index);
        out
    }
}

/// Feature record echoed back without geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureEcho {
    pub id: FeatureId,
    #[serde(rename = "type")]
    pub kind: GeometryType,
    pub layer: String,
    pub properties: Map<String, Value>,
}

impl FeatureEcho {
    fn from_feature(feature: &TileFeature) -> Self {
        Self {
            id: feature.id.clone(),
            kind: feature.kind,
            layer: feature.layer.clone(),
            properties: feature.properties.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TilePayload {
    /// Keyed by plugin index; plugins that claimed nothing are absent.
    pub data: BTreeMap<usize, PluginOutput>,
    /// One slot per tile feature, `None` where no plugin claimed it.
    pub features: Option<Vec<Option<FeatureEcho>>>,
}

impl TilePayload {
    pub fn arrays(&self) -> Vec<&TypedArray> {
        self.data.values().flat_map(PluginOutput::arrays).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub features_claimed: usize,
    pub geometry_errors: usize,
}

#[derive(Debug, Clone)]
pub struct TileOutput {
    pub payload: TilePayload,
    pub transfer: Vec<ArrayBuffer>,
    pub report: BuildReport,
}

/// Geometry built for one plugin, with the claims it was built from.
#[derive(Debug, Clone)]
pub struct PluginBuild {
    pub plugin: usize,
    /// `(feature ordinal, style index)` in feature order.
    pub claims: Vec<(usize, usize)>,
    pub faces: Faces,
}

/// Assembles the payload and transfer list of one tile.
///
/// Builds with no claims are skipped. Malformed faces abort packaging so that
/// no partially valid buffer is ever handed out.
pub fn package_tile(
    features: &[TileFeature],
    marks: &StyleMarks,
    builds: Vec<PluginBuild>,
    echo_features: bool,
) -> Result<TileOutput, WorkerError> {
    let mut payload = TilePayload::default();
    let mut transfer = TransferList::new();
    let mut report = BuildReport::default();

    for build in builds {
        if build.claims.is_empty() {
            continue;
        }
        if !build.faces.is_well_formed() {
            return Err(WorkerError::build(format!(
                "plugin {} produced malformed geometry",
                build.plugin
            )));
        }
        report.geometry_errors += build.faces.geometry_errors;
        report.features_claimed += build.claims.len();

        let pairs: Vec<u32> = build
            .claims
            .iter()
            .flat_map(|&(ordinal, style)| [ordinal as u32, style as u32])
            .collect();
        let output = PluginOutput {
            data: GeometryBuffers::from_faces(build.faces),
            feature_index: IndexBuffer::from_values(&pairs).into_typed_array(),
        };
        for array in output.arrays() {
            transfer.push(array);
        }
        payload.data.insert(build.plugin, output);
    }

    if echo_features {
        payload.features = Some(
            features
                .iter()
                .enumerate()
                .map(|(i, f)| marks.is_claimed(i).then(|| FeatureEcho::from_feature(f)))
                .collect(),
        );
    }

    Ok(TileOutput {
        payload,
        transfer: transfer.into_vec(),
        report,
    })
}
