//! Per-layer job driver: style lifecycle, data lifecycle and tile builds.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use formats::feature::TileFeature;
use geometry::builder::build_tile_geometry;
use geometry::faces::BuildContext;
use serde_json::Value;
use style::config::CompiledStyle;
use style::marker::mark_features;
use tracing::{debug, warn};

use crate::error::WorkerError;
use crate::options::{LoadTileRequest, WorkerOptions};
use crate::packager::{PluginBuild, TileOutput, package_tile};
use crate::source::{DataInput, DataSummary, GeoJsonSource, TileSource};

/// Serves tile requests of one layer from a [`TileSource`].
///
/// The compiled style is an immutable snapshot. [`LayerWorker::update_style`]
/// swaps in a new one; a build that already captured the previous snapshot
/// finishes against it.
#[derive(Debug)]
pub struct LayerWorker<S> {
    options: WorkerOptions,
    style: Arc<CompiledStyle>,
    source: S,
}

impl<S: TileSource> LayerWorker<S> {
    /// Compiles `options.style`; a worker never exists without a style.
    pub fn new(options: WorkerOptions, source: S) -> Result<Self, WorkerError> {
        options.validate()?;
        let style = CompiledStyle::compile(&options.style)?;
        Ok(Self {
            options,
            style: Arc::new(style),
            source,
        })
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    /// Snapshot of the style currently in effect.
    pub fn style(&self) -> Arc<CompiledStyle> {
        Arc::clone(&self.style)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Recompiles the style. On failure the previous style stays in effect.
    pub fn update_style(&mut self, value: &Value) -> Result<(), WorkerError> {
        let style = CompiledStyle::compile(value).map_err(|err| {
            warn!(%err, "style update rejected");
            WorkerError::from(err)
        })?;
        self.style = Arc::new(style);
        self.options.style = value.clone();
        Ok(())
    }

    /// Builds one tile.
    ///
    /// Reports [`WorkerError::LoadingPending`] while the source has no data.
    /// A panic inside the build is converted into [`WorkerError::Build`].
    pub fn load_tile(&self, request: &LoadTileRequest) -> Result<TileOutput, WorkerError> {
        let style = self.style();
        let info = request.tile_info;
        let extent = info.extent.unwrap_or(self.options.extent);
        let ctx = BuildContext {
            extent,
            tile_size: self.options.tile_size,
            gl_scale: request.gl_scale,
            z_scale: request.z_scale,
        };
        let echo = self.options.features;

        let built = catch_unwind(AssertUnwindSafe(|| {
            let features = self.source.tile_features(info.coord(), extent)?;
            let out = build_tile(&style, &features, &ctx, echo)?;
            Ok::<_, WorkerError>((features.len(), out))
        }));
        let (feature_count, out) =
            built.map_err(|panic| WorkerError::build(panic_message(panic.as_ref())))??;

        debug!(
            tile = %info.coord(),
            features = feature_count,
            plugins = out.payload.data.len(),
            buffers = out.transfer.len(),
            "built tile"
        );
        Ok(out)
    }
}

impl LayerWorker<GeoJsonSource> {
    /// Worker over an initially empty GeoJSON source.
    pub fn geojson(options: WorkerOptions) -> Result<Self, WorkerError> {
        let source = GeoJsonSource::new(options.index_options()?);
        Self::new(options, source)
    }

    /// Replaces the layer data synchronously.
    ///
    /// Remote inputs need an actor to fetch them and are rejected here. Any
    /// failure leaves the layer without data.
    pub fn set_data(&mut self, data: Value) -> Result<DataSummary, WorkerError> {
        match DataInput::parse(data) {
            Ok(DataInput::Inline(value)) => self.source.set_inline(value),
            Ok(DataInput::Remote(request)) => {
                self.source.begin_load();
                Err(WorkerError::config(format!(
                    "{} must be fetched through a worker actor",
                    request.url
                )))
            }
            Err(err) => {
                self.source.begin_load();
                Err(err)
            }
        }
    }
}

/// Marks `features` against `style`, builds every plugin's geometry and
/// packages the result.
pub fn build_tile(
    style: &CompiledStyle,
    features: &[TileFeature],
    ctx: &BuildContext,
    echo_features: bool,
) -> Result<TileOutput, WorkerError> {
    let marks = mark_features(style.plugins(), features);

    let builds = style
        .plugins()
        .iter()
        .enumerate()
        .filter_map(|(plugin, config)| {
            let claims: Vec<(usize, usize)> = marks.claimed(plugin).collect();
            if claims.is_empty() {
                return None;
            }
            let claimed: Vec<&TileFeature> = claims.iter().map(|&(i, _)| &features[i]).collect();
            let faces = build_tile_geometry(&claimed, &config.data_config, ctx);
            Some(PluginBuild {
                plugin,
                claims,
                faces,
            })
        })
        .collect();

    package_tile(features, &marks, builds, echo_features)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during tile build".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::LayerWorker;
    use crate::error::WorkerError;
    use crate::options::{LoadTileRequest, WorkerOptions};
    use crate::source::TileSource;
    use formats::feature::TileFeature;
    use serde_json::json;
    use tiling::coord::{TileCoord, TileInfo};

    struct EmptySource;

    impl TileSource for EmptySource {
        fn tile_features(&self, _: TileCoord, _: f64) -> Result<Vec<TileFeature>, WorkerError> {
            Ok(Vec::new())
        }
    }

    struct PanickingSource;

    impl TileSource for PanickingSource {
        fn tile_features(&self, _: TileCoord, _: f64) -> Result<Vec<TileFeature>, WorkerError> {
            panic!("index corrupted")
        }
    }

    fn request() -> LoadTileRequest {
        LoadTileRequest::new(TileInfo {
            z: 0,
            x: 0,
            y: 0,
            extent: None,
        })
    }

    #[test]
    fn bad_style_keeps_previous_snapshot() {
        let mut worker = LayerWorker::new(
            WorkerOptions {
                style: json!([{ "style": [{ "filter": true }] }]),
                ..WorkerOptions::default()
            },
            EmptySource,
        )
        .unwrap();
        let before = worker.style();

        let err = worker.update_style(&json!([{ "style": [{ "filter": ["?"] }] }]));
        assert!(matches!(err, Err(WorkerError::StyleCompilation(_))));
        assert_eq!(worker.style(), before);

        worker.update_style(&json!([])).unwrap();
        assert!(worker.style().is_empty());
        // The captured snapshot is untouched by the swap.
        assert_eq!(before.len(), 1);
    }

    #[test]
    fn construction_requires_a_valid_style() {
        let opts = WorkerOptions {
            style: json!(42),
            ..WorkerOptions::default()
        };
        assert!(matches!(
            LayerWorker::new(opts, EmptySource),
            Err(WorkerError::StyleCompilation(_))
        ));
    }

    #[test]
    fn geojson_worker_reports_loading_until_data_arrives() {
        let mut worker = LayerWorker::geojson(WorkerOptions::default()).unwrap();
        assert_eq!(worker.load_tile(&request()).unwrap_err(), WorkerError::LoadingPending);

        worker
            .set_data(json!({ "type": "Point", "coordinates": [0.0, 0.0] }))
            .unwrap();
        let out = worker.load_tile(&request()).unwrap();
        // No plugins, so nothing is claimed or transferred.
        assert!(out.payload.data.is_empty());
        assert!(out.transfer.is_empty());
    }

    #[test]
    fn panics_become_build_errors() {
        let worker = LayerWorker::new(WorkerOptions::default(), PanickingSource).unwrap();
        assert_eq!(
            worker.load_tile(&request()).unwrap_err(),
            WorkerError::Build {
                message: "index corrupted".to_string()
            }
        );
    }
}
