//! Single-threaded worker actor.
//!
//! An actor is one tokio task owning every layer assigned to it. Commands
//! arrive over a bounded channel and are handled one at a time, so layer
//! state is never shared. Remote `setData` fetches run in their own task and
//! come back to the actor as a `DataLoaded` command.

use std::collections::BTreeMap;

use foundation::ids::LayerId;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::layer_worker::LayerWorker;
use crate::options::{LoadTileRequest, WorkerOptions};
use crate::packager::TileOutput;
use crate::source::{DataInput, DataSummary, GeoJsonSource, fetch_geojson};
use crate::stats::{self, StatsSnapshot, WorkerStats};

type Reply<T> = oneshot::Sender<Result<T, WorkerError>>;

enum Command {
    AddLayer {
        layer: LayerId,
        options: Box<WorkerOptions>,
        reply: Reply<()>,
    },
    RemoveLayer {
        layer: LayerId,
        reply: oneshot::Sender<bool>,
    },
    UpdateStyle {
        layer: LayerId,
        style: Value,
        reply: Reply<()>,
    },
    SetData {
        layer: LayerId,
        data: Value,
        reply: Reply<DataSummary>,
    },
    DataLoaded {
        layer: LayerId,
        generation: u64,
        result: Result<Value, WorkerError>,
        reply: Reply<DataSummary>,
    },
    LoadTile {
        layer: LayerId,
        request: LoadTileRequest,
        reply: Reply<TileOutput>,
    },
    Stats {
        reply: oneshot::Sender<StatsSnapshot>,
    },
}

/// Cloneable address of a running worker actor.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Command>,
}

impl WorkerHandle {
    /// Spawns an actor on the current tokio runtime.
    ///
    /// The actor stops once every handle is dropped.
    pub fn spawn(queue_depth: usize, client: reqwest::Client) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let actor = WorkerActor {
            layers: BTreeMap::new(),
            stats: WorkerStats::new(),
            client,
            inbox: tx.downgrade(),
        };
        tokio::spawn(actor.run(rx));
        Self { tx }
    }

    pub async fn add_layer(&self, layer: LayerId, options: WorkerOptions) -> Result<(), WorkerError> {
        self.call(|reply| Command::AddLayer {
            layer,
            options: Box::new(options),
            reply,
        })
        .await?
    }

    /// Returns whether the layer existed.
    pub async fn remove_layer(&self, layer: LayerId) -> Result<bool, WorkerError> {
        self.call(|reply| Command::RemoveLayer { layer, reply }).await
    }

    pub async fn update_style(&self, layer: LayerId, style: Value) -> Result<(), WorkerError> {
        self.call(|reply| Command::UpdateStyle {
            layer,
            style,
            reply,
        })
        .await?
    }

    /// Replaces a layer's data. See [`DataInput::parse`] for accepted inputs.
    pub async fn set_data(&self, layer: LayerId, data: Value) -> Result<DataSummary, WorkerError> {
        self.call(|reply| Command::SetData { layer, data, reply })
            .await?
    }

    pub async fn load_tile(
        &self,
        layer: LayerId,
        request: LoadTileRequest,
    ) -> Result<TileOutput, WorkerError> {
        self.call(|reply| Command::LoadTile {
            layer,
            request,
            reply,
        })
        .await?
    }

    pub async fn stats(&self) -> Result<StatsSnapshot, WorkerError> {
        self.call(|reply| Command::Stats { reply }).await
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| WorkerError::Disconnected)?;
        rx.await.map_err(|_| WorkerError::Disconnected)
    }
}

struct WorkerActor {
    layers: BTreeMap<LayerId, LayerWorker<GeoJsonSource>>,
    stats: WorkerStats,
    client: reqwest::Client,
    inbox: mpsc::WeakSender<Command>,
}

impl WorkerActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        debug!(layers = self.layers.len(), "worker actor stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::AddLayer {
                layer,
                options,
                reply,
            } => {
                let result = LayerWorker::geojson(*options).map(|worker| {
                    self.layers.insert(layer, worker);
                });
                let _ = reply.send(result);
            }
            Command::RemoveLayer { layer, reply } => {
                let _ = reply.send(self.layers.remove(&layer).is_some());
            }
            Command::UpdateStyle {
                layer,
                style,
                reply,
            } => {
                let result = self
                    .layer_mut(layer)
                    .and_then(|worker| worker.update_style(&style));
                if result.is_ok() {
                    self.stats.inc(stats::STYLE_UPDATES, 1);
                }
                let _ = reply.send(result);
            }
            Command::SetData { layer, data, reply } => self.set_data(layer, data, reply),
            Command::DataLoaded {
                layer,
                generation,
                result,
                reply,
            } => {
                let outcome = match self.layer_mut(layer) {
                    Ok(worker) => worker.source_mut().finish_load(generation, result),
                    Err(err) => Some(Err(err)),
                };
                let outcome = outcome
                    .unwrap_or_else(|| Err(WorkerError::data_source("superseded by a later setData")));
                self.record_data_result(layer, &outcome);
                let _ = reply.send(outcome);
            }
            Command::LoadTile {
                layer,
                request,
                reply,
            } => {
                let result = self.layer(layer).and_then(|worker| worker.load_tile(&request));
                match &result {
                    Ok(out) => {
                        self.stats.inc(stats::TILES_BUILT, 1);
                        self.stats
                            .inc(stats::FEATURES_CLAIMED, out.report.features_claimed as u64);
                        self.stats
                            .inc(stats::GEOMETRY_ERRORS, out.report.geometry_errors as u64);
                    }
                    Err(WorkerError::LoadingPending) => self.stats.inc(stats::TILES_PENDING, 1),
                    Err(err) => warn!(%err, layer = layer.0, "tile build failed"),
                }
                // Results are always delivered after a yield, never inline.
                tokio::task::yield_now().await;
                let _ = reply.send(result);
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.stats.snapshot());
            }
        }
    }

    fn set_data(&mut self, layer: LayerId, data: Value, reply: Reply<DataSummary>) {
        let input = match DataInput::parse(data) {
            Ok(input) => input,
            Err(err) => {
                // The previous data is gone either way: a failed setData
                // leaves the layer loading until the next successful one.
                if let Ok(worker) = self.layer_mut(layer) {
                    worker.source_mut().begin_load();
                }
                self.record_data_result(layer, &Err(err.clone()));
                let _ = reply.send(Err(err));
                return;
            }
        };

        let worker = match self.layer_mut(layer) {
            Ok(worker) => worker,
            Err(err) => {
                let _ = reply.send(Err(err));
                return;
            }
        };
        let generation = worker.source_mut().begin_load();

        match input {
            DataInput::Inline(value) => {
                let outcome = worker
                    .source_mut()
                    .finish_load(generation, Ok(value))
                    .unwrap_or_else(|| Err(WorkerError::data_source("superseded by a later setData")));
                self.record_data_result(layer, &outcome);
                let _ = reply.send(outcome);
            }
            DataInput::Remote(request) => {
                let Some(inbox) = self.inbox.upgrade() else {
                    let _ = reply.send(Err(WorkerError::Disconnected));
                    return;
                };
                info!(url = %request.url, layer = layer.0, generation, "fetching GeoJSON");
                let client = self.client.clone();
                tokio::spawn(async move {
                    let result = fetch_geojson(&client, &request).await;
                    let loaded = Command::DataLoaded {
                        layer,
                        generation,
                        result,
                        reply,
                    };
                    if inbox.send(loaded).await.is_err() {
                        debug!(layer = layer.0, "worker stopped before data arrived");
                    }
                });
            }
        }
    }

    fn record_data_result(&mut self, layer: LayerId, outcome: &Result<DataSummary, WorkerError>) {
        match outcome {
            Ok(_) => self.stats.inc(stats::DATA_LOADS, 1),
            Err(err) => {
                error!(%err, layer = layer.0, "setData failed");
                self.stats.inc(stats::DATA_ERRORS, 1);
            }
        }
    }

    fn layer(&self, layer: LayerId) -> Result<&LayerWorker<GeoJsonSource>, WorkerError> {
        self.layers
            .get(&layer)
            .ok_or_else(|| WorkerError::config(format!("unknown layer {}", layer.0)))
    }

    fn layer_mut(&mut self, layer: LayerId) -> Result<&mut LayerWorker<GeoJsonSource>, WorkerError> {
        self.layers
            .get_mut(&layer)
            .ok_or_else(|| WorkerError::config(format!("unknown layer {}", layer.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::WorkerHandle;
    use crate::error::WorkerError;
    use crate::options::{LoadTileRequest, WorkerOptions};
    use crate::stats;
    use foundation::ids::LayerId;
    use serde_json::json;
    use tiling::coord::TileInfo;

    fn request() -> LoadTileRequest {
        LoadTileRequest::new(TileInfo {
            z: 0,
            x: 0,
            y: 0,
            extent: None,
        })
    }

    #[tokio::test]
    async fn malformed_json_then_loading() {
        let handle = WorkerHandle::spawn(8, reqwest::Client::new());
        let layer = LayerId(1);
        handle.add_layer(layer, WorkerOptions::default()).await.unwrap();

        let err = handle.set_data(layer, json!("{\"type\": ")).await.unwrap_err();
        assert!(matches!(err, WorkerError::DataSource { .. }));
        assert!(err.to_string().contains("invalid GeoJSON"));

        let pending = handle.load_tile(layer, request()).await.unwrap_err();
        assert!(pending.is_loading());

        let snap = handle.stats().await.unwrap();
        assert_eq!(snap.counter(stats::DATA_ERRORS), 1);
        assert_eq!(snap.counter(stats::TILES_PENDING), 1);
    }

    #[tokio::test]
    async fn unknown_layers_are_config_errors() {
        let handle = WorkerHandle::spawn(8, reqwest::Client::new());
        assert!(matches!(
            handle.load_tile(LayerId(9), request()).await,
            Err(WorkerError::Config { .. })
        ));
        assert!(!handle.remove_layer(LayerId(9)).await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_url_is_a_data_source_error() {
        let handle = WorkerHandle::spawn(8, reqwest::Client::new());
        let layer = LayerId(2);
        handle.add_layer(layer, WorkerOptions::default()).await.unwrap();
        handle
            .set_data(layer, json!({ "type": "Point", "coordinates": [1.0, 1.0] }))
            .await
            .unwrap();

        let err = handle
            .set_data(layer, json!({ "url": "http://127.0.0.1:1/data.geojson" }))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::DataSource { .. }));
        // The old data was dropped when the new load started.
        assert!(handle.load_tile(layer, request()).await.unwrap_err().is_loading());
    }

    #[tokio::test]
    async fn tiles_report_loading_while_remote_fetch_is_in_flight() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/slow.geojson", listener.local_addr().unwrap());

        let handle = WorkerHandle::spawn(8, reqwest::Client::new());
        let layer = LayerId(3);
        handle.add_layer(layer, WorkerOptions::default()).await.unwrap();
        handle
            .set_data(layer, json!({ "type": "Point", "coordinates": [1.0, 1.0] }))
            .await
            .unwrap();

        let pending_load = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.set_data(layer, json!({ "url": url })).await })
        };
        // The connection is accepted but never answered.
        let (_socket, _) = listener.accept().await.unwrap();

        assert_eq!(
            handle.load_tile(layer, request()).await.unwrap_err(),
            WorkerError::LoadingPending
        );
        assert!(!pending_load.is_finished());

        // A later inline load supersedes the stalled fetch.
        handle
            .set_data(layer, json!({ "type": "Point", "coordinates": [2.0, 2.0] }))
            .await
            .unwrap();
        assert!(handle.load_tile(layer, request()).await.is_ok());
        pending_load.abort();
    }
}
