//! On-demand tile index over GeoJSON features.
//!
//! Features are projected once when the index is built. Tile queries select
//! features by bounding box, simplify at the tile's resolution, clip to the
//! buffered tile bounds and round into tile-local integer coordinates.

use foundation::bounds::Aabb2;
use foundation::ids::FeatureId;
use formats::feature::{GeometryType, TileFeature, TilePoint};
use formats::geojson::{GeoPoint, SourceData, SourceGeometry};
use serde_json::{Map, Value};

use crate::clip::{clip_line, clip_points, clip_ring};
use crate::coord::TileCoord;
use crate::error::IndexError;
use crate::projection::Projection;
use crate::simplify::{ProjPoint, simplify};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexOptions {
    /// Margin around each tile, in tile-local extent units.
    pub buffer: f64,
    /// Simplification tolerance, in tile-local extent units.
    pub tolerance: f64,
    pub projection: Projection,
    /// Keep the third ordinate of source coordinates as vertex altitude.
    pub has_altitude: bool,
}

impl IndexOptions {
    /// Options with the projection named by `code` (`None` for Web Mercator).
    pub fn with_projection_code(self, code: Option<&str>) -> Result<Self, IndexError> {
        let projection = Projection::from_code(code)
            .ok_or_else(|| IndexError::UnknownProjection(code.unwrap_or_default().to_string()))?;
        Ok(Self { projection, ..self })
    }
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            buffer: 64.0,
            tolerance: 3.0,
            projection: Projection::WebMercator,
            has_altitude: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Part {
    points: Vec<ProjPoint>,
    /// Polygon rings only: first ring of its polygon.
    outer: bool,
}

#[derive(Debug, Clone)]
struct IndexedFeature {
    id: FeatureId,
    layer: String,
    properties: Map<String, Value>,
    kind: GeometryType,
    parts: Vec<Part>,
    bbox: Aabb2,
}

#[derive(Debug, Clone)]
pub struct GeoJsonIndex {
    features: Vec<IndexedFeature>,
    options: IndexOptions,
    lon_lat_bounds: Aabb2,
}

impl GeoJsonIndex {
    pub fn build(data: &SourceData, options: IndexOptions) -> Self {
        let features = data
            .features
            .iter()
            .map(|f| {
                let (kind, parts) = project_geometry(&f.geometry, options.projection);
                let mut bbox = Aabb2::empty();
                for p in parts.iter().flat_map(|part| part.points.iter()) {
                    bbox.extend(p[0], p[1]);
                }
                IndexedFeature {
                    id: f.id.clone(),
                    layer: f.layer.clone(),
                    properties: f.properties.clone(),
                    kind,
                    parts,
                    bbox,
                }
            })
            .collect();

        Self {
            features,
            options,
            lon_lat_bounds: data.lon_lat_bounds(),
        }
    }

    /// Parses GeoJSON and indexes it, returning the normalized source as well.
    pub fn from_geojson(value: &Value, options: IndexOptions) -> Result<(Self, SourceData), IndexError> {
        let data = SourceData::from_geojson_value(value)?;
        Ok((Self::build(&data, options), data))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn lon_lat_bounds(&self) -> Aabb2 {
        self.lon_lat_bounds
    }

    /// Features intersecting `coord`, in tile-local coordinates of the given `extent`.
    ///
    /// Output order follows the source order, so feature ordinals are stable
    /// across repeated queries of the same tile.
    pub fn get_tile(&self, coord: TileCoord, extent: f64) -> Vec<TileFeature> {
        if !coord.is_valid() || extent <= 0.0 {
            return Vec::new();
        }

        let n = TileCoord::tiles_per_axis(coord.z) as f64;
        let bounds = coord.projected_bounds(self.options.buffer / extent);
        let tolerance = self.options.tolerance / (n * extent);
        let sq_tolerance = tolerance * tolerance;

        let to_tile = |p: &ProjPoint| {
            TilePoint::with_z(
                ((p[0] * n - coord.x as f64) * extent).round(),
                ((p[1] * n - coord.y as f64) * extent).round(),
                if self.options.has_altitude { p[2] } else { 0.0 },
            )
        };

        let mut out = Vec::new();
        for feat in &self.features {
            if !feat.bbox.intersects(&bounds) {
                continue;
            }

            let mut geometry: Vec<Vec<TilePoint>> = Vec::new();
            match feat.kind {
                GeometryType::Point => {
                    let pts: Vec<ProjPoint> = feat
                        .parts
                        .iter()
                        .flat_map(|part| clip_points(&part.points, &bounds))
                        .collect();
                    if !pts.is_empty() {
                        geometry.push(pts.iter().map(to_tile).collect());
                    }
                }
                GeometryType::LineString => {
                    for part in &feat.parts {
                        let simplified = simplify(&part.points, sq_tolerance);
                        for piece in clip_line(&simplified, &bounds) {
                            geometry.push(piece.iter().map(to_tile).collect());
                        }
                    }
                }
                GeometryType::Polygon => {
                    let mut outer_kept = false;
                    for part in &feat.parts {
                        if !part.outer && !outer_kept {
                            continue;
                        }
                        let simplified = simplify(&part.points, sq_tolerance);
                        let open = open_ring(&simplified);
                        let clipped = if open.len() >= 3 {
                            clip_ring(open, &bounds)
                        } else {
                            Vec::new()
                        };
                        if clipped.len() < 3 {
                            if part.outer {
                                outer_kept = false;
                            }
                            continue;
                        }
                        if part.outer {
                            outer_kept = true;
                        }
                        let mut ring: Vec<TilePoint> = clipped.iter().map(to_tile).collect();
                        ring.push(ring[0]);
                        geometry.push(ring);
                    }
                }
            }

            if geometry.is_empty() {
                continue;
            }
            out.push(TileFeature {
                id: feat.id.clone(),
                kind: feat.kind,
                layer: feat.layer.clone(),
                properties: feat.properties.clone(),
                geometry,
            });
        }
        out
    }
}

fn open_ring(points: &[ProjPoint]) -> &[ProjPoint] {
    match (points.first(), points.last()) {
        (Some(a), Some(b)) if points.len() > 1 && a[0] == b[0] && a[1] == b[1] => {
            &points[..points.len() - 1]
        }
        _ => points,
    }
}

fn project_geometry(geometry: &SourceGeometry, projection: Projection) -> (GeometryType, Vec<Part>) {
    let project = |pts: &[GeoPoint]| -> Vec<ProjPoint> {
        pts.iter()
            .map(|p| {
                let (x, y) = projection.project(p.lon_deg, p.lat_deg);
                [x, y, p.alt_m]
            })
            .collect()
    };
    let line = |pts: &[GeoPoint]| Part {
        points: project(pts),
        outer: false,
    };
    let polygon = |rings: &[Vec<GeoPoint>]| {
        rings
            .iter()
            .enumerate()
            .map(|(i, ring)| {
                let mut points = project(ring);
                let outer = i == 0;
                // Outer rings positive signed area in tile space, holes negative.
                if (signed_area(&points) > 0.0) != outer {
                    points.reverse();
                }
                Part { points, outer }
            })
            .collect::<Vec<_>>()
    };

    match geometry {
        SourceGeometry::Point(p) => (GeometryType::Point, vec![line(std::slice::from_ref(p))]),
        SourceGeometry::MultiPoint(ps) => (GeometryType::Point, vec![line(ps)]),
        SourceGeometry::LineString(ps) => (GeometryType::LineString, vec![line(ps)]),
        SourceGeometry::MultiLineString(lines) => (
            GeometryType::LineString,
            lines.iter().map(|l| line(l)).collect(),
        ),
        SourceGeometry::Polygon(rings) => (GeometryType::Polygon, polygon(rings)),
        SourceGeometry::MultiPolygon(polys) => (
            GeometryType::Polygon,
            polys.iter().flat_map(|rings| polygon(rings)).collect(),
        ),
    }
}

fn signed_area(points: &[ProjPoint]) -> f64 {
    let mut sum = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        sum += a[0] * b[1] - b[0] * a[1];
    }
    sum / 2.0
}

#[cfg(test)]
mod tests {
    use super::{GeoJsonIndex, IndexOptions};
    use crate::coord::TileCoord;
    use crate::error::IndexError;
    use crate::projection::Projection;
    use formats::feature::GeometryType;
    use formats::geojson::SourceData;
    use serde_json::json;

    fn square(lon0: f64, lat0: f64, size: f64) -> serde_json::Value {
        json!([[
            [lon0, lat0],
            [lon0 + size, lat0],
            [lon0 + size, lat0 + size],
            [lon0, lat0 + size],
            [lon0, lat0]
        ]])
    }

    fn sample() -> SourceData {
        SourceData::from_geojson_value(&json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "height": 10 },
                  "geometry": { "type": "Polygon", "coordinates": square(10.0, 10.0, 5.0) } },
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Point", "coordinates": [-100.0, -40.0] } },
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "LineString",
                                "coordinates": [[-170.0, 0.0], [170.0, 0.0]] } }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn world_tile_returns_every_feature() {
        let index = GeoJsonIndex::build(&sample(), IndexOptions::default());
        let feats = index.get_tile(TileCoord::new(0, 0, 0), 8192.0);
        assert_eq!(feats.len(), 3);
        for f in &feats {
            for p in f.geometry.iter().flatten() {
                assert_eq!(p.x, p.x.round());
                assert!(p.x >= -64.0 && p.x <= 8192.0 + 64.0);
            }
        }
    }

    #[test]
    fn polygon_rings_are_closed_and_positive() {
        let index = GeoJsonIndex::build(&sample(), IndexOptions::default());
        let feats = index.get_tile(TileCoord::new(0, 0, 0), 8192.0);
        let poly = feats
            .iter()
            .find(|f| f.kind == GeometryType::Polygon)
            .expect("polygon");
        let ring = &poly.geometry[0];
        assert_eq!(ring.first(), ring.last());
        let mut area = 0.0;
        for w in ring.windows(2) {
            area += w[0].x * w[1].y - w[1].x * w[0].y;
        }
        assert!(area > 0.0);
    }

    #[test]
    fn query_selects_by_tile() {
        let index = GeoJsonIndex::build(&sample(), IndexOptions::default());
        // North-east quadrant holds only the polygon (the line sits on the equator,
        // inside the buffered margin).
        let ne = index.get_tile(TileCoord::new(1, 1, 0), 4096.0);
        assert!(ne.iter().any(|f| f.kind == GeometryType::Polygon));
        assert!(ne.iter().all(|f| f.kind != GeometryType::Point));

        let sw = index.get_tile(TileCoord::new(1, 0, 1), 4096.0);
        assert!(sw.iter().any(|f| f.kind == GeometryType::Point));
        assert!(sw.iter().all(|f| f.kind != GeometryType::Polygon));

        assert!(index.get_tile(TileCoord::new(1, 5, 0), 4096.0).is_empty());
    }

    #[test]
    fn altitude_is_kept_only_when_requested() {
        let data = SourceData::from_geojson_value(&json!({
            "type": "Point", "coordinates": [1.0, 1.0, 25.0]
        }))
        .unwrap();
        let flat = GeoJsonIndex::build(&data, IndexOptions::default());
        assert_eq!(flat.get_tile(TileCoord::new(0, 0, 0), 4096.0)[0].geometry[0][0].z, 0.0);

        let with_alt = GeoJsonIndex::build(
            &data,
            IndexOptions {
                has_altitude: true,
                projection: Projection::Wgs84,
                ..IndexOptions::default()
            },
        );
        assert_eq!(
            with_alt.get_tile(TileCoord::new(0, 0, 0), 4096.0)[0].geometry[0][0].z,
            25.0
        );
    }

    #[test]
    fn construction_errors_are_reported() {
        assert_eq!(
            IndexOptions::default().with_projection_code(Some("EPSG:2154")),
            Err(IndexError::UnknownProjection("EPSG:2154".to_string()))
        );
        assert!(matches!(
            GeoJsonIndex::from_geojson(&json!({ "type": "Topology" }), IndexOptions::default()),
            Err(IndexError::Source(_))
        ));
        let (index, data) =
            GeoJsonIndex::from_geojson(&json!([]), IndexOptions::default()).expect("empty array");
        assert!(index.is_empty() && data.is_empty());
    }
}
