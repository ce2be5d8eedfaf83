//! Per-plugin geometry construction.

use formats::feature::TileFeature;
use foundation::index_type::IndexBuffer;
use style::config::DataConfig;
use tracing::debug;

use crate::extrude::{ExtrudeParams, extrude_features};
use crate::faces::{BuildContext, Faces};
use crate::normals::build_normals;
use crate::shadow::build_shadow_volume;
use crate::unique::build_unique_vertex;

/// Builds renderable faces for the features one plugin claimed.
///
/// Position `k` of `features` is the claim ordinal written to
/// [`Faces::indexes`]. Data configs other than extrusion produce no faces.
pub fn build_tile_geometry(
    features: &[&TileFeature],
    config: &DataConfig,
    ctx: &BuildContext,
) -> Faces {
    if !config.is_extrusion() {
        debug!(kind = %config.kind, "no geometry builder for data config");
        return Faces::default();
    }

    let params = ExtrudeParams::new(config, ctx.gl_scale, ctx.v_scale());
    let extruded = extrude_features(features, &params);

    let mut faces = Faces {
        vertices: extruded.vertices,
        indices: IndexBuffer::from_values(&extruded.indices),
        indexes: IndexBuffer::from_values(&extruded.indexes),
        uvs: extruded.uvs,
        geometry_errors: extruded.geometry_errors,
        ..Faces::default()
    };

    if config.tangent {
        debug!("tangents requested; none are generated");
    }

    let old_indices = config.shadow_volume.then(|| faces.indices.clone());
    build_unique_vertex(&mut faces);

    if config.normal || config.shadow_volume {
        let normals = build_normals(&faces.vertices, &faces.indices);
        if let Some(old) = old_indices {
            faces.shadow_volume = Some(build_shadow_volume(
                &old,
                &faces.vertices,
                &faces.indices,
                &normals,
                &faces.indexes,
                config.shadow_dir,
            ));
        }
        if config.normal {
            faces.normals = Some(normals);
        }
    }

    faces
}

#[cfg(test)]
mod tests {
    use super::build_tile_geometry;
    use crate::faces::BuildContext;
    use formats::feature::{GeometryType, TileFeature, TilePoint};
    use foundation::ids::FeatureId;
    use foundation::index_type::IndexType;
    use serde_json::json;
    use style::config::DataConfig;

    fn ctx() -> BuildContext {
        BuildContext {
            extent: 8192.0,
            tile_size: [256.0, 256.0],
            gl_scale: 1.0,
            z_scale: 1.0,
        }
    }

    fn square(id: i64, x: f64, size: f64, height: f64) -> TileFeature {
        let ring = vec![
            TilePoint::new(x, 0.0),
            TilePoint::new(x + size, 0.0),
            TilePoint::new(x + size, size),
            TilePoint::new(x, size),
            TilePoint::new(x, 0.0),
        ];
        TileFeature {
            id: FeatureId::Int(id),
            kind: GeometryType::Polygon,
            layer: "0".to_string(),
            properties: json!({ "height": height }).as_object().cloned().unwrap(),
            geometry: vec![ring],
        }
    }

    fn extrusion() -> DataConfig {
        DataConfig {
            height_property: Some("height".to_string()),
            ..DataConfig::extrusion()
        }
    }

    #[test]
    fn extruded_box_is_unique_vertex_with_normals() {
        let f = square(1, 0.0, 100.0, 10.0);
        let cfg = DataConfig {
            normal: true,
            ..extrusion()
        };
        let faces = build_tile_geometry(&[&f], &cfg, &ctx());

        // Roof (2) + 4 walls (8) triangles, three corners each.
        assert_eq!(faces.vertex_count(), 30);
        assert_eq!(faces.indices.to_vec(), (0..30).collect::<Vec<u32>>());
        assert_eq!(faces.indices.index_type(), IndexType::U8);
        assert!(faces.is_well_formed());

        let normals = faces.normals.as_ref().expect("normals");
        // Roof corners face up, walls lie flat in z.
        assert_eq!(&normals[0..3], &[0.0, 0.0, 1.0]);
        assert!(normals[18..].chunks_exact(3).all(|n| n[2] == 0.0));
        // Top z = height * v_scale = 10 * 32.
        assert_eq!(faces.vertices[2], 320.0);
    }

    #[test]
    fn many_features_widen_indices_past_u8() {
        let features: Vec<TileFeature> = (0..10)
            .map(|i| square(i, i as f64 * 200.0, 100.0, 5.0))
            .collect();
        let refs: Vec<&TileFeature> = features.iter().collect();
        let faces = build_tile_geometry(&refs, &extrusion(), &ctx());

        // 10 features * 30 corners.
        assert_eq!(faces.vertex_count(), 300);
        assert_eq!(faces.indices.index_type(), IndexType::U16);
        assert_eq!(faces.indexes.max_value(), Some(9));
        assert_eq!(faces.indexes.index_type(), IndexType::U8);
        assert!(faces.normals.is_none());
    }

    #[test]
    fn shadow_volume_is_built_from_the_welded_mesh() {
        let f = square(1, 0.0, 100.0, 10.0);
        let cfg = DataConfig {
            shadow_volume: true,
            shadow_dir: [0.0, 0.0, -1.0],
            ..extrusion()
        };
        let faces = build_tile_geometry(&[&f], &cfg, &ctx());
        let volume = faces.shadow_volume.as_ref().expect("shadow volume");

        assert!(faces.normals.is_none());
        assert!(volume.is_well_formed());
        // Only the roof faces straight-down light: 4 cap + 4 ground corners,
        // 2 + 2 cap triangles and 4 silhouette quads.
        assert_eq!(volume.vertex_count(), 8);
        assert_eq!(volume.indices.len() / 3, 12);
    }

    #[test]
    fn non_extrusion_configs_build_nothing() {
        let f = square(1, 0.0, 10.0, 1.0);
        let cfg = DataConfig {
            kind: "line".to_string(),
            ..DataConfig::default()
        };
        let faces = build_tile_geometry(&[&f], &cfg, &ctx());
        assert!(faces.is_empty());
        assert!(faces.is_well_formed());
    }
}
