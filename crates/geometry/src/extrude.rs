//! Polygon extrusion into top and side faces.
//!
//! Input rings are in tile-local units with `y` growing downwards; outer rings
//! arrive with positive signed area. Faces are emitted with counter-clockwise
//! winding seen from outside so that face normals point out of the volume.

use earcutr::earcut;
use formats::feature::{GeometryType, TileFeature, TilePoint};
use style::config::DataConfig;
use tracing::warn;

/// Extrusion parameters resolved against one tile.
#[derive(Debug, Clone, Copy)]
pub struct ExtrudeParams<'a> {
    pub config: &'a DataConfig,
    pub gl_scale: f64,
    /// Meters to tile units.
    pub v_scale: f64,
}

impl<'a> ExtrudeParams<'a> {
    pub fn new(config: &'a DataConfig, gl_scale: f64, v_scale: f64) -> Self {
        Self {
            config,
            gl_scale,
            v_scale,
        }
    }

    fn altitude(&self, feature: &TileFeature) -> f64 {
        self.config
            .altitude_property
            .as_deref()
            .and_then(|key| feature.property_f64(key))
            .map(|v| v * self.config.altitude_scale)
            .unwrap_or(self.config.default_altitude)
    }

    fn height(&self, feature: &TileFeature) -> f64 {
        self.config
            .height_property
            .as_deref()
            .and_then(|key| feature.property_f64(key))
            .map(|v| v * self.config.altitude_scale)
            .unwrap_or(self.config.default_height)
    }

    fn uv_scale(&self) -> Option<[f64; 2]> {
        if !self.config.uv {
            return None;
        }
        let [w, h] = self.config.uv_size;
        let w = if w > 0.0 { w } else { 1.0 };
        let h = if h > 0.0 { h } else { 1.0 };
        Some([self.gl_scale / w, self.gl_scale / h])
    }
}

/// Raw extrusion output before vertex deduplication.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extruded {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    /// Feature ordinal per vertex.
    pub indexes: Vec<u32>,
    pub uvs: Option<Vec<f32>>,
    pub geometry_errors: usize,
}

impl Extruded {
    fn vertex_count(&self) -> u32 {
        (self.vertices.len() / 3) as u32
    }

    fn push_vertex(&mut self, feature: u32, x: f64, y: f64, z: f64, uv: Option<[f64; 2]>) -> u32 {
        let index = self.vertex_count();
        self.vertices.extend([x as f32, y as f32, z as f32]);
        self.indexes.push(feature);
        if let (Some(uvs), Some([u, v])) = (self.uvs.as_mut(), uv) {
            uvs.extend([u as f32, v as f32]);
        }
        index
    }
}

/// A polygon with outer ring wound positive and holes wound negative.
struct Polygon {
    rings: Vec<Vec<TilePoint>>,
}

/// Extrudes every polygon feature. Feature `k` of `features` writes `k` into
/// `indexes` for each vertex it produces.
pub fn extrude_features(features: &[&TileFeature], params: &ExtrudeParams) -> Extruded {
    let mut out = Extruded {
        uvs: params.uv_scale().map(|_| Vec::new()),
        ..Extruded::default()
    };

    for (ordinal, feature) in features.iter().enumerate() {
        if feature.kind != GeometryType::Polygon {
            continue;
        }
        let altitude = params.altitude(feature);
        let height = params.height(feature);
        if !feature.has_finite_geometry() || !altitude.is_finite() || !height.is_finite() {
            warn!(feature = %feature.id, "dropping feature with non-finite geometry");
            out.geometry_errors += 1;
            continue;
        }

        for polygon in classify_rings(&feature.geometry) {
            if params.config.top {
                push_top(&mut out, ordinal as u32, &polygon, altitude, height, params);
            }
            if params.config.side && height > 0.0 {
                push_sides(&mut out, ordinal as u32, &polygon, altitude, height, params);
            }
        }
    }
    out
}

/// Groups rings into polygons: a ring whose winding matches the first ring
/// starts a new polygon, any other ring is a hole of the current one.
fn classify_rings(rings: &[Vec<TilePoint>]) -> Vec<Polygon> {
    let mut polygons: Vec<Polygon> = Vec::new();
    let mut outer_sign = 0.0;

    for ring in rings {
        let ring = open_ring(ring);
        if ring.len() < 3 {
            continue;
        }
        let area = signed_area(&ring);
        if area == 0.0 {
            continue;
        }
        if outer_sign == 0.0 {
            outer_sign = area.signum();
        }

        let mut ring = ring;
        if area.signum() == outer_sign || polygons.is_empty() {
            if area < 0.0 {
                ring.reverse();
            }
            polygons.push(Polygon { rings: vec![ring] });
        } else if let Some(polygon) = polygons.last_mut() {
            if area > 0.0 {
                ring.reverse();
            }
            polygon.rings.push(ring);
        }
    }
    polygons
}

fn open_ring(ring: &[TilePoint]) -> Vec<TilePoint> {
    let mut points = ring.to_vec();
    if points.len() >= 2 {
        let first = points[0];
        let last = points[points.len() - 1];
        if first.x == last.x && first.y == last.y {
            points.pop();
        }
    }
    points
}

fn signed_area(ring: &[TilePoint]) -> f64 {
    let mut sum = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let b = ring[(i + 1) % ring.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

fn push_top(
    out: &mut Extruded,
    feature: u32,
    polygon: &Polygon,
    altitude: f64,
    height: f64,
    params: &ExtrudeParams,
) {
    let mut coords = Vec::new();
    let mut holes = Vec::new();
    for (i, ring) in polygon.rings.iter().enumerate() {
        if i > 0 {
            holes.push(coords.len() / 2);
        }
        for p in ring {
            coords.extend([p.x, p.y]);
        }
    }

    let triangles = match earcut(&coords, &holes, 2) {
        Ok(ix) => ix,
        Err(_) => {
            warn!(feature, "failed to triangulate roof");
            return;
        }
    };
    if triangles.is_empty() {
        return;
    }

    let uv_scale = params.uv_scale();
    let base = out.vertex_count();
    for p in polygon.rings.iter().flatten() {
        let z = (altitude + p.z) * params.v_scale + height * params.v_scale;
        let uv = uv_scale.map(|[su, sv]| [p.x * su, p.y * sv]);
        out.push_vertex(feature, p.x, p.y, z, uv);
    }

    for tri in triangles.chunks_exact(3) {
        let (a, mut b, mut c) = (tri[0], tri[1], tri[2]);
        let cross = (coords[2 * b] - coords[2 * a]) * (coords[2 * c + 1] - coords[2 * a + 1])
            - (coords[2 * b + 1] - coords[2 * a + 1]) * (coords[2 * c] - coords[2 * a]);
        // Roof faces +z.
        if cross < 0.0 {
            std::mem::swap(&mut b, &mut c);
        }
        out.indices
            .extend([base + a as u32, base + b as u32, base + c as u32]);
    }
}

fn push_sides(
    out: &mut Extruded,
    feature: u32,
    polygon: &Polygon,
    altitude: f64,
    height: f64,
    params: &ExtrudeParams,
) {
    let uv_scale = params.uv_scale();
    for ring in &polygon.rings {
        let mut distance = 0.0;
        for (i, a) in ring.iter().enumerate() {
            let b = ring[(i + 1) % ring.len()];
            let length = (b.x - a.x).hypot(b.y - a.y);
            if length == 0.0 {
                continue;
            }

            let a_bottom = (altitude + a.z) * params.v_scale;
            let b_bottom = (altitude + b.z) * params.v_scale;
            let lift = height * params.v_scale;
            let corners = [
                (a.x, a.y, a_bottom, distance),
                (b.x, b.y, b_bottom, distance + length),
                (b.x, b.y, b_bottom + lift, distance + length),
                (a.x, a.y, a_bottom + lift, distance),
            ];
            let first = out.vertex_count();
            for (x, y, z, d) in corners {
                let uv = uv_scale.map(|[su, sv]| [d * su, z * sv]);
                out.push_vertex(feature, x, y, z, uv);
            }
            out.indices
                .extend([first, first + 1, first + 2, first, first + 2, first + 3]);
            distance += length;
        }
    }
}
