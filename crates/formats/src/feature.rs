use foundation::ids::FeatureId;
use serde::Serialize;
use serde_json::{Map, Value};

/// Geometry kind of a tile feature, numbered like vector-tile geometry types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum GeometryType {
    Point = 1,
    LineString = 2,
    Polygon = 3,
}

impl GeometryType {
    /// Name used by `$type` in style filters.
    pub const fn name(self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
        }
    }
}

/// Vertex in tile-local coordinates. `z` is an altitude in meters, 0 unless
/// the source carried a third ordinate and altitude retention was enabled.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TilePoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl TilePoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub const fn with_z(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// One feature clipped to a tile.
///
/// `geometry` holds one point list per ring/line part. Points of a multipoint
/// share a single list.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFeature {
    pub id: FeatureId,
    pub kind: GeometryType,
    pub layer: String,
    pub properties: Map<String, Value>,
    pub geometry: Vec<Vec<TilePoint>>,
}

impl TileFeature {
    /// Numeric property value; numeric strings are accepted.
    pub fn property_f64(&self, key: &str) -> Option<f64> {
        match self.properties.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn has_finite_geometry(&self) -> bool {
        self.geometry.iter().flatten().all(TilePoint::is_finite)
    }
}
