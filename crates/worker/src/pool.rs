use foundation::ids::LayerId;
use serde::Deserialize;
use serde_json::Value;

use crate::actor::WorkerHandle;
use crate::error::WorkerError;
use crate::options::{LoadTileRequest, WorkerOptions};
use crate::packager::TileOutput;
use crate::source::DataSummary;
use crate::stats::StatsSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolConfig {
    pub workers: usize,
    /// Commands buffered per actor before senders wait.
    pub queue_depth: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_depth: 256,
        }
    }
}

/// Fixed set of worker actors. Every layer lives on exactly one actor,
/// chosen from its id, so all commands for a layer are handled in order.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    actors: Vec<WorkerHandle>,
}

impl WorkerPool {
    /// Spawns `config.workers` actors on the current tokio runtime.
    pub fn new(config: PoolConfig) -> Result<Self, WorkerError> {
        if config.workers == 0 {
            return Err(WorkerError::config("worker pool needs at least one worker"));
        }
        let client = reqwest::Client::new();
        let actors = (0..config.workers)
            .map(|_| WorkerHandle::spawn(config.queue_depth, client.clone()))
            .collect();
        Ok(Self { actors })
    }

    pub fn size(&self) -> usize {
        self.actors.len()
    }

    /// Index of the actor hosting `layer`.
    pub fn actor_index(&self, layer: LayerId) -> usize {
        (layer.0 % self.actors.len() as u64) as usize
    }

    pub fn actor(&self, layer: LayerId) -> &WorkerHandle {
        &self.actors[self.actor_index(layer)]
    }

    pub async fn add_layer(&self, layer: LayerId, options: WorkerOptions) -> Result<(), WorkerError> {
        self.actor(layer).add_layer(layer, options).await
    }

    pub async fn remove_layer(&self, layer: LayerId) -> Result<bool, WorkerError> {
        self.actor(layer).remove_layer(layer).await
    }

    pub async fn update_style(&self, layer: LayerId, style: Value) -> Result<(), WorkerError> {
        self.actor(layer).update_style(layer, style).await
    }

    pub async fn set_data(&self, layer: LayerId, data: Value) -> Result<DataSummary, WorkerError> {
        self.actor(layer).set_data(layer, data).await
    }

    pub async fn load_tile(
        &self,
        layer: LayerId,
        request: LoadTileRequest,
    ) -> Result<TileOutput, WorkerError> {
        self.actor(layer).load_tile(layer, request).await
    }

    /// Counters summed over every actor.
    pub async fn stats(&self) -> Result<StatsSnapshot, WorkerError> {
        let mut snapshots = Vec::with_capacity(self.actors.len());
        for actor in &self.actors {
            snapshots.push(actor.stats().await?);
        }
        Ok(StatsSnapshot::merge(snapshots))
    }
}
