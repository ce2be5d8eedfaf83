use std::collections::BTreeMap;

use foundation::bounds::Aabb2;
use foundation::ids::FeatureId;
use serde_json::{Map, Value};

/// Source layer name used when a feature does not carry one.
pub const DEFAULT_LAYER: &str = "0";

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoPoint {
    pub lon_deg: f64,
    pub lat_deg: f64,
    /// Third GeoJSON ordinate in meters, 0 when absent.
    pub alt_m: f64,
}

impl GeoPoint {
    pub fn new(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon_deg,
            lat_deg,
            alt_m: 0.0,
        }
    }

    pub fn with_altitude(lon_deg: f64, lat_deg: f64, alt_m: f64) -> Self {
        Self {
            lon_deg,
            lat_deg,
            alt_m,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceGeometry {
    Point(GeoPoint),
    MultiPoint(Vec<GeoPoint>),
    LineString(Vec<GeoPoint>),
    MultiLineString(Vec<Vec<GeoPoint>>),
    Polygon(Vec<Vec<GeoPoint>>),
    MultiPolygon(Vec<Vec<Vec<GeoPoint>>>),
}

impl SourceGeometry {
    pub fn for_each_point(&self, mut f: impl FnMut(&GeoPoint)) {
        match self {
            SourceGeometry::Point(p) => f(p),
            SourceGeometry::MultiPoint(ps) | SourceGeometry::LineString(ps) => ps.iter().for_each(f),
            SourceGeometry::MultiLineString(lines) | SourceGeometry::Polygon(lines) => {
                lines.iter().flatten().for_each(f)
            }
            SourceGeometry::MultiPolygon(polys) => polys.iter().flatten().flatten().for_each(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceFeature {
    pub id: FeatureId,
    pub layer: String,
    pub properties: Map<String, Value>,
    pub geometry: SourceGeometry,
}

/// Normalized GeoJSON input: every feature carries an id and a layer name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceData {
    pub features: Vec<SourceFeature>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeoJsonError {
    Parse(String),
    NotGeoJson,
    InvalidFeature { index: usize, reason: String },
}

impl std::fmt::Display for GeoJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoJsonError::Parse(reason) => write!(f, "JSON parse error: {reason}"),
            GeoJsonError::NotGeoJson => {
                write!(f, "expected a GeoJSON FeatureCollection, Feature, Geometry or feature array")
            }
            GeoJsonError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for GeoJsonError {}

struct RawFeature {
    id: Option<FeatureId>,
    layer: String,
    properties: Map<String, Value>,
    geometry: SourceGeometry,
}

impl SourceData {
    pub fn from_geojson_str(payload: &str) -> Result<Self, GeoJsonError> {
        let value: Value =
            serde_json::from_str(payload).map_err(|e| GeoJsonError::Parse(e.to_string()))?;
        Self::from_geojson_value(&value)
    }

    pub fn from_geojson_value(value: &Value) -> Result<Self, GeoJsonError> {
        let raw = match value {
            Value::Array(items) => parse_feature_list(items)?,
            Value::Object(obj) => {
                let ty = obj
                    .get("type")
                    .and_then(|v| v.as_str())
                    .ok_or(GeoJsonError::NotGeoJson)?;
                match ty {
                    "FeatureCollection" => {
                        let features = obj
                            .get("features")
                            .and_then(|v| v.as_array())
                            .ok_or(GeoJsonError::NotGeoJson)?;
                        parse_feature_list(features)?
                    }
                    "Feature" => parse_feature(0, value)?.into_iter().collect(),
                    _ => {
                        let geometry = parse_geometry(value)
                            .map_err(|reason| GeoJsonError::InvalidFeature { index: 0, reason })?;
                        vec![RawFeature {
                            id: None,
                            layer: DEFAULT_LAYER.to_string(),
                            properties: Map::new(),
                            geometry,
                        }]
                    }
                }
            }
            _ => return Err(GeoJsonError::NotGeoJson),
        };

        Ok(Self {
            features: assign_ids(raw),
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature id to properties, as returned to the caller of `setData`.
    pub fn id_map(&self) -> BTreeMap<FeatureId, Map<String, Value>> {
        self.features
            .iter()
            .map(|f| (f.id.clone(), f.properties.clone()))
            .collect()
    }

    /// Longitude/latitude bounds of every coordinate.
    pub fn lon_lat_bounds(&self) -> Aabb2 {
        let mut bounds = Aabb2::empty();
        for feat in &self.features {
            feat.geometry
                .for_each_point(|p| bounds.extend(p.lon_deg, p.lat_deg));
        }
        bounds
    }
}

// Ids present in the source are kept. Missing ids are numbered after the
// largest integer id so they never collide with it.
fn assign_ids(raw: Vec<RawFeature>) -> Vec<SourceFeature> {
    let mut next = raw
        .iter()
        .filter_map(|f| match f.id {
            Some(FeatureId::Int(n)) => Some(n),
            _ => None,
        })
        .max()
        .map(|n| n.saturating_add(1))
        .unwrap_or(0);

    raw.into_iter()
        .map(|f| {
            let id = f.id.unwrap_or_else(|| {
                let id = FeatureId::Int(next);
                next = next.saturating_add(1);
                id
            });
            SourceFeature {
                id,
                layer: f.layer,
                properties: f.properties,
                geometry: f.geometry,
            }
        })
        .collect()
}

fn parse_feature_list(items: &[Value]) -> Result<Vec<RawFeature>, GeoJsonError> {
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if let Some(feat) = parse_feature(index, item)? {
            out.push(feat);
        }
    }
    Ok(out)
}

// Features with a null geometry are valid GeoJSON but carry nothing to tile.
fn parse_feature(index: usize, value: &Value) -> Result<Option<RawFeature>, GeoJsonError> {
    let feat_obj = value.as_object().ok_or(GeoJsonError::InvalidFeature {
        index,
        reason: "feature must be an object".to_string(),
    })?;

    let feat_type = feat_obj.get("type").and_then(|v| v.as_str()).ok_or(
        GeoJsonError::InvalidFeature {
            index,
            reason: "feature missing type".to_string(),
        },
    )?;
    if feat_type != "Feature" {
        return Err(GeoJsonError::InvalidFeature {
            index,
            reason: format!("unexpected feature type: {feat_type}"),
        });
    }

    let id = match feat_obj.get("id") {
        Some(Value::String(s)) => Some(FeatureId::Str(s.clone())),
        Some(Value::Number(n)) => Some(match n.as_i64() {
            Some(i) => FeatureId::Int(i),
            None => FeatureId::Str(n.to_string()),
        }),
        _ => None,
    };

    let layer = match feat_obj.get("layer") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => DEFAULT_LAYER.to_string(),
    };

    let properties = feat_obj
        .get("properties")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let geometry_val = match feat_obj.get("geometry") {
        None => {
            return Err(GeoJsonError::InvalidFeature {
                index,
                reason: "feature missing geometry".to_string(),
            });
        }
        Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let geometry = parse_geometry(geometry_val)
        .map_err(|reason| GeoJsonError::InvalidFeature { index, reason })?;

    Ok(Some(RawFeature {
        id,
        layer,
        properties,
        geometry,
    }))
}

fn parse_geometry(value: &Value) -> Result<SourceGeometry, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;

    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    match ty {
        "Point" => Ok(SourceGeometry::Point(parse_point(coords)?)),
        "MultiPoint" => Ok(SourceGeometry::MultiPoint(parse_points(coords)?)),
        "LineString" => Ok(SourceGeometry::LineString(parse_points(coords)?)),
        "MultiLineString" => Ok(SourceGeometry::MultiLineString(parse_rings(coords)?)),
        "Polygon" => Ok(SourceGeometry::Polygon(parse_rings(coords)?)),
        "MultiPolygon" => Ok(SourceGeometry::MultiPolygon(parse_multi_polygon(coords)?)),
        other => Err(format!("unsupported geometry type: {other}")),
    }
}

fn parse_point(coords: &Value) -> Result<GeoPoint, String> {
    let arr = coords
        .as_array()
        .ok_or("position must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("position must have [lon, lat]".to_string());
    }
    let lon = arr[0].as_f64().ok_or("lon must be a number".to_string())?;
    let lat = arr[1].as_f64().ok_or("lat must be a number".to_string())?;
    let alt = match arr.get(2) {
        Some(v) => v.as_f64().ok_or("altitude must be a number".to_string())?,
        None => 0.0,
    };
    Ok(GeoPoint::with_altitude(lon, lat, alt))
}

/// Parses one nesting level of a coordinate array.
fn parse_nested<T>(
    coords: &Value,
    what: &str,
    item: impl Fn(&Value) -> Result<T, String>,
) -> Result<Vec<T>, String> {
    coords
        .as_array()
        .ok_or_else(|| format!("coordinates must be an array of {what}"))?
        .iter()
        .map(item)
        .collect()
}

fn parse_points(coords: &Value) -> Result<Vec<GeoPoint>, String> {
    parse_nested(coords, "positions", parse_point)
}

fn parse_rings(coords: &Value) -> Result<Vec<Vec<GeoPoint>>, String> {
    parse_nested(coords, "rings", parse_points)
}

fn parse_multi_polygon(coords: &Value) -> Result<Vec<Vec<Vec<GeoPoint>>>, String> {
    parse_nested(coords, "polygons", parse_rings)
}
