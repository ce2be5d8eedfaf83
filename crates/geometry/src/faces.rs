use foundation::index_type::IndexBuffer;

/// Tile parameters that scale geometry construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildContext {
    pub extent: f64,
    pub tile_size: [f64; 2],
    pub gl_scale: f64,
    pub z_scale: f64,
}

impl BuildContext {
    /// Meters to tile-local units: heights are authored in meters while
    /// footprints are in tile extent units.
    pub fn v_scale(&self) -> f64 {
        if self.tile_size[0] <= 0.0 {
            return self.z_scale;
        }
        self.z_scale * self.extent / self.tile_size[0]
    }
}

/// Renderable geometry built for one plugin.
///
/// `vertices` holds `x, y, z` triples, `indexes` one entry per vertex giving
/// the ordinal of its feature in the plugin's claim list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Faces {
    pub vertices: Vec<f32>,
    pub indices: IndexBuffer,
    pub indexes: IndexBuffer,
    pub normals: Option<Vec<f32>>,
    pub uvs: Option<Vec<f32>>,
    pub shadow_volume: Option<ShadowVolume>,
    /// Features dropped because of malformed geometry.
    pub geometry_errors: usize,
}

impl Faces {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Layout invariants every transferred result must hold.
    pub fn is_well_formed(&self) -> bool {
        let count = self.vertex_count();
        self.vertices.len() % 3 == 0
            && self.indices.len() % 3 == 0
            && self.indices.to_vec().iter().all(|&i| (i as usize) < count)
            && self.indexes.len() == count
            && self.normals.as_ref().is_none_or(|n| n.len() == self.vertices.len())
            && self.uvs.as_ref().is_none_or(|uv| uv.len() == count * 2)
            && self.shadow_volume.as_ref().is_none_or(ShadowVolume::is_well_formed)
    }
}

/// Closed volume swept from the light-facing faces along the light direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowVolume {
    pub vertices: Vec<f32>,
    pub indices: IndexBuffer,
    pub indexes: IndexBuffer,
}

impl ShadowVolume {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn is_well_formed(&self) -> bool {
        let count = self.vertex_count();
        self.vertices.len() % 3 == 0
            && self.indices.len() % 3 == 0
            && self.indices.to_vec().iter().all(|&i| (i as usize) < count)
            && self.indexes.len() == count
    }
}
