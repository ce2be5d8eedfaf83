//! Shadow volume extrusion.
//!
//! Triangles facing the light form the front cap. The cap is projected along
//! the light direction onto the ground plane `z = 0` to form the back cap, and
//! every silhouette edge of the lit region is swept into a quad joining the
//! two caps. Silhouettes are found on the welded mesh: corners sharing an
//! index of the indexed geometry, or an exact position, are one vertex.

use std::collections::HashMap;

use foundation::index_type::IndexBuffer;
use foundation::math::Vec3;

use crate::faces::ShadowVolume;

/// Builds the volume cast by `vertices`/`indices` (unique-vertex layout)
/// under light travelling along `shadow_dir`.
///
/// `old_indices` is the index buffer before vertex expansion, corner for
/// corner with `indices`. Light that does not travel downwards casts no
/// volume.
pub fn build_shadow_volume(
    old_indices: &IndexBuffer,
    vertices: &[f32],
    indices: &IndexBuffer,
    normals: &[f32],
    indexes: &IndexBuffer,
    shadow_dir: [f64; 3],
) -> ShadowVolume {
    let empty = ShadowVolume {
        indexes: IndexBuffer::with_min_type(&[], indexes.index_type()),
        ..ShadowVolume::default()
    };

    let dir = Vec3::new(shadow_dir[0], shadow_dir[1], shadow_dir[2]).normalize();
    if !dir.is_finite() || dir.z >= 0.0 {
        return empty;
    }

    let corners = indices.to_vec();
    let old = old_indices.to_vec();
    let count = vertices.len() / 3;
    if old.len() != corners.len() || corners.iter().any(|&c| c as usize >= count) {
        return empty;
    }

    let position = |i: u32| {
        let i = i as usize;
        Vec3::from_f32([vertices[3 * i], vertices[3 * i + 1], vertices[3 * i + 2]])
    };
    let normal = |i: u32| {
        let i = i as usize;
        match normals.get(3 * i..3 * i + 3) {
            Some(n) => Vec3::from_f32([n[0], n[1], n[2]]),
            None => Vec3::ZERO,
        }
    };

    let welded = weld(&corners, &old, vertices);

    let lit: Vec<bool> = corners
        .chunks_exact(3)
        .map(|tri| {
            let n = normal(tri[0]) + normal(tri[1]) + normal(tri[2]);
            n.dot(dir) < 0.0
        })
        .collect();

    // Undirected welded edge -> number of lit triangles using it.
    let mut edge_uses: HashMap<(u32, u32), u32> = HashMap::new();
    for (t, tri) in welded.chunks_exact(3).enumerate() {
        if !lit[t] {
            continue;
        }
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            if a != b {
                *edge_uses.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
    }

    let mut volume = VolumeBuilder::new(dir);
    let feature_of = |corner: u32| indexes.get(corner as usize).unwrap_or(0);

    for (t, tri) in corners.chunks_exact(3).enumerate() {
        if !lit[t] {
            continue;
        }
        let w = &welded[3 * t..3 * t + 3];
        let mut front = [0u32; 3];
        let mut back = [0u32; 3];
        for k in 0..3 {
            let feature = feature_of(tri[k]);
            front[k] = volume.cap(w[k], position(tri[k]), feature);
            back[k] = volume.projected(w[k], position(tri[k]), feature);
        }

        volume.triangle(front[0], front[1], front[2]);
        volume.triangle(back[0], back[2], back[1]);

        for (i, j) in [(0, 1), (1, 2), (2, 0)] {
            let (a, b) = (w[i], w[j]);
            if a == b || edge_uses.get(&(a.min(b), a.max(b))) != Some(&1) {
                continue;
            }
            volume.triangle(front[i], back[i], back[j]);
            volume.triangle(front[i], back[j], front[j]);
        }
    }

    volume.finish(indexes)
}

/// Canonical vertex id per corner.
fn weld(corners: &[u32], old: &[u32], vertices: &[f32]) -> Vec<u32> {
    let mut by_old: HashMap<u32, u32> = HashMap::new();
    let mut by_position: HashMap<[u32; 3], u32> = HashMap::new();

    corners
        .iter()
        .zip(old)
        .map(|(&corner, &o)| {
            if let Some(&id) = by_old.get(&o) {
                return id;
            }
            let i = corner as usize;
            // +0.0 folds -0.0 into 0.0 so both hash alike.
            let key = [
                (vertices[3 * i] + 0.0).to_bits(),
                (vertices[3 * i + 1] + 0.0).to_bits(),
                (vertices[3 * i + 2] + 0.0).to_bits(),
            ];
            let id = *by_position.entry(key).or_insert(o);
            by_old.insert(o, id);
            id
        })
        .collect()
}

struct VolumeBuilder {
    dir: Vec3,
    vertices: Vec<f32>,
    indices: Vec<u32>,
    indexes: Vec<u32>,
    caps: HashMap<u32, u32>,
    projections: HashMap<u32, u32>,
}

impl VolumeBuilder {
    fn new(dir: Vec3) -> Self {
        Self {
            dir,
            vertices: Vec::new(),
            indices: Vec::new(),
            indexes: Vec::new(),
            caps: HashMap::new(),
            projections: HashMap::new(),
        }
    }

    fn push(&mut self, p: Vec3, feature: u32) -> u32 {
        let index = (self.vertices.len() / 3) as u32;
        self.vertices.extend(p.to_f32());
        self.indexes.push(feature);
        index
    }

    fn cap(&mut self, welded: u32, p: Vec3, feature: u32) -> u32 {
        if let Some(&i) = self.caps.get(&welded) {
            return i;
        }
        let i = self.push(p, feature);
        self.caps.insert(welded, i);
        i
    }

    fn projected(&mut self, welded: u32, p: Vec3, feature: u32) -> u32 {
        if let Some(&i) = self.projections.get(&welded) {
            return i;
        }
        let ground = p + self.dir * (p.z / -self.dir.z);
        let i = self.push(Vec3::new(ground.x, ground.y, 0.0), feature);
        self.projections.insert(welded, i);
        i
    }

    fn triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend([a, b, c]);
    }

    fn finish(self, indexes: &IndexBuffer) -> ShadowVolume {
        ShadowVolume {
            vertices: self.vertices,
            indices: IndexBuffer::from_values(&self.indices),
            indexes: IndexBuffer::with_min_type(&self.indexes, indexes.index_type()),
        }
    }
}
