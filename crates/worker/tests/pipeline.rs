use std::collections::HashSet;

use foundation::buffer::ElementType;
use foundation::ids::LayerId;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tiling::coord::TileInfo;
use worker::{
    GeoJsonSource, LayerWorker, LoadTileRequest, PoolConfig, TileOutput, WorkerError,
    WorkerOptions, WorkerPool, stats,
};

fn buildings() -> Value {
    let square = |lon: f64, lat: f64| {
        json!([[
            [lon, lat],
            [lon + 1.0, lat],
            [lon + 1.0, lat + 1.0],
            [lon, lat + 1.0],
            [lon, lat]
        ]])
    };
    json!({
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "properties": { "height": 10, "kind": "tower" },
              "geometry": { "type": "Polygon", "coordinates": square(10.0, 10.0) } },
            { "type": "Feature", "properties": { "height": 4, "kind": "house" },
              "geometry": { "type": "Polygon", "coordinates": square(20.0, 10.0) } },
            { "type": "Feature", "properties": { "kind": "tree" },
              "geometry": { "type": "Point", "coordinates": [30.0, 10.0] } }
        ]
    })
}

fn extrusion_style(shadow: bool) -> Value {
    json!([
        {
            "renderPlugin": {
                "type": "lit",
                "dataConfig": {
                    "type": "3d-extrusion",
                    "defaultAltitude": 0,
                    "defaultHeight": 0,
                    "heightProperty": "height",
                    "normal": true,
                    "uv": true,
                    "shadowVolume": shadow
                }
            },
            "style": [
                { "filter": ["==", "kind", "tower"], "symbol": { "polygonFill": "#f00" } },
                { "filter": ["==", "$type", "Polygon"], "symbol": { "polygonFill": "#888" } }
            ]
        },
        {
            "renderPlugin": { "type": "icon", "dataConfig": { "type": "point" } },
            "style": [{ "filter": ["==", "kind", "fountain"] }]
        }
    ])
}

fn world_tile() -> LoadTileRequest {
    LoadTileRequest::new(TileInfo {
        z: 0,
        x: 0,
        y: 0,
        extent: None,
    })
}

fn loaded_worker(style: Value, echo: bool) -> LayerWorker<GeoJsonSource> {
    let mut worker = LayerWorker::geojson(WorkerOptions {
        style,
        features: echo,
        ..WorkerOptions::default()
    })
    .expect("worker");
    worker.set_data(buildings()).expect("data");
    worker
}

fn assert_transfer_complete(out: &TileOutput) {
    let listed: Vec<_> = out.transfer.iter().map(|b| b.id()).collect();
    let unique: HashSet<_> = listed.iter().copied().collect();
    assert_eq!(unique.len(), listed.len(), "duplicate transfer entries");

    let referenced: HashSet<_> = out.payload.arrays().iter().map(|a| a.buffer().id()).collect();
    assert_eq!(referenced, unique);
}

#[test]
fn extruded_polygon_reaches_scaled_height() {
    let out = loaded_worker(extrusion_style(false), false)
        .load_tile(&world_tile())
        .expect("tile");
    let plugin = &out.payload.data[&0];

    let vertices = plugin.data.vertices.to_f32_vec().expect("float vertices");
    assert_eq!(vertices.len() % 3, 0);
    let count = (vertices.len() / 3) as u32;
    let indices = plugin.data.indices.to_u32_vec().expect("integer indices");
    assert!(indices.iter().all(|&i| i < count));

    // height 10 m * zScale 1 * extent 8192 / tileSize 256.
    assert!(vertices.chunks_exact(3).any(|v| v[2] == 320.0));
    assert!(vertices.chunks_exact(3).any(|v| v[2] == 128.0));

    assert_eq!(plugin.data.vertices.element_type(), ElementType::F32);
    assert_eq!(plugin.data.normals.as_ref().map(|n| n.len()), Some(vertices.len()));
    assert_eq!(plugin.data.uvs.as_ref().map(|n| n.len()), Some(2 * count as usize));
    assert!(plugin.data.shadow_volume.is_none());
    assert_transfer_complete(&out);
}

#[test]
fn feature_index_pairs_ordinals_with_winning_rules() {
    let out = loaded_worker(extrusion_style(false), false)
        .load_tile(&world_tile())
        .expect("tile");
    let index = out.payload.data[&0].feature_index.to_u32_vec().unwrap();
    // Tower claimed by rule 0, house by rule 1; the point is unclaimed.
    assert_eq!(index, vec![0, 0, 1, 1]);
    assert_eq!(out.report.features_claimed, 2);
}

#[test]
fn plugins_claiming_nothing_are_omitted() {
    let out = loaded_worker(extrusion_style(false), false)
        .load_tile(&world_tile())
        .expect("tile");
    assert_eq!(out.payload.data.keys().copied().collect::<Vec<_>>(), vec![0]);
}

#[test]
fn shadow_volume_buffers_are_transferred_separately() {
    let out = loaded_worker(extrusion_style(true), false)
        .load_tile(&world_tile())
        .expect("tile");
    let data = &out.payload.data[&0].data;
    let shadow = data.shadow_volume.as_ref().expect("shadow volume");

    assert!(!shadow.vertices.is_empty());
    assert!(!shadow.indices.is_empty());
    assert_eq!(shadow.indexes.len() * 3, shadow.vertices.len());

    let main: HashSet<_> = [&data.vertices, &data.indices, &data.indexes]
        .iter()
        .map(|a| a.buffer().id())
        .collect();
    for array in [&shadow.vertices, &shadow.indices, &shadow.indexes] {
        let id = array.buffer().id();
        assert!(!main.contains(&id));
        assert!(out.transfer.iter().any(|b| b.id() == id));
    }
    assert_transfer_complete(&out);
}

#[test]
fn echoed_features_leave_unclaimed_slots_empty() {
    let out = loaded_worker(extrusion_style(false), true)
        .load_tile(&world_tile())
        .expect("tile");
    let echoed = out.payload.features.expect("echo");
    assert_eq!(echoed.len(), 3);
    assert!(echoed[0].is_some() && echoed[1].is_some());
    assert!(echoed[2].is_none());

    let tower = serde_json::to_value(echoed[0].as_ref().unwrap()).unwrap();
    assert_eq!(tower["type"], "Polygon");
    assert_eq!(tower["layer"], "0");
    assert_eq!(tower["properties"]["kind"], "tower");
    assert!(tower.get("geometry").is_none());
}

#[test]
fn malformed_json_reports_error_then_loading() {
    let mut worker = loaded_worker(extrusion_style(false), false);
    let err = worker.set_data(json!("{ broken"));
    assert!(matches!(err, Err(WorkerError::DataSource { .. })));
    assert_eq!(worker.load_tile(&world_tile()).unwrap_err(), WorkerError::LoadingPending);
}

#[tokio::test]
async fn pool_serves_layers_independently() {
    let pool = WorkerPool::new(PoolConfig {
        workers: 2,
        queue_depth: 16,
    })
    .expect("pool");
    let (a, b) = (LayerId(1), LayerId(2));
    for layer in [a, b] {
        pool.add_layer(
            layer,
            WorkerOptions {
                style: extrusion_style(false),
                ..WorkerOptions::default()
            },
        )
        .await
        .expect("add layer");
    }

    let summary = pool.set_data(a, buildings()).await.expect("set data");
    assert_eq!(summary.id_map.len(), 3);
    assert!(pool.load_tile(b, world_tile()).await.unwrap_err().is_loading());

    let out = pool.load_tile(a, world_tile()).await.expect("tile");
    assert_transfer_complete(&out);

    // A new style applies to later builds only; the earlier output is intact.
    pool.update_style(a, json!([])).await.expect("style");
    let after = pool.load_tile(a, world_tile()).await.expect("tile");
    assert!(after.payload.data.is_empty());
    assert_eq!(out.payload.data.len(), 1);

    let snapshot = pool.stats().await.expect("stats");
    assert_eq!(snapshot.counter(stats::TILES_BUILT), 2);
    assert_eq!(snapshot.counter(stats::TILES_PENDING), 1);
    assert_eq!(snapshot.counter(stats::STYLE_UPDATES), 1);
    assert_eq!(snapshot.counter(stats::DATA_LOADS), 1);
}

#[tokio::test]
async fn pool_set_data_parses_json_strings() {
    let pool = WorkerPool::new(PoolConfig::default()).expect("pool");
    let layer = LayerId(5);
    pool.add_layer(layer, WorkerOptions::default()).await.unwrap();

    let text = buildings().to_string();
    let summary = pool.set_data(layer, Value::String(text)).await.expect("set data");
    assert_eq!(summary.id_map.len(), 3);

    let err = pool.set_data(layer, json!("[1, 2")).await.unwrap_err();
    assert!(matches!(err, WorkerError::DataSource { .. }));
    assert!(pool.load_tile(layer, world_tile()).await.unwrap_err().is_loading());
}
