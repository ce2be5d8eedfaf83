use std::collections::BTreeMap;

use serde::Serialize;

pub const TILES_BUILT: &str = "tiles_built";
pub const TILES_PENDING: &str = "tiles_pending";
pub const FEATURES_CLAIMED: &str = "features_claimed";
pub const GEOMETRY_ERRORS: &str = "geometry_errors";
pub const STYLE_UPDATES: &str = "style_updates";
pub const DATA_LOADS: &str = "data_loads";
pub const DATA_ERRORS: &str = "data_errors";

/// Worker counters. Sorted so snapshots compare and print deterministically.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    counters: BTreeMap<&'static str, u64>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub counters: Vec<(String, u64)>,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&mut self, name: &'static str, by: u64) {
        *self.counters.entry(name).or_insert(0) += by;
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            counters: self
                .counters
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }
}

impl StatsSnapshot {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }

    /// Sums counters of several actors.
    pub fn merge(snapshots: impl IntoIterator<Item = StatsSnapshot>) -> StatsSnapshot {
        let mut sums: BTreeMap<String, u64> = BTreeMap::new();
        for snap in snapshots {
            for (k, v) in snap.counters {
                *sums.entry(k).or_insert(0) += v;
            }
        }
        StatsSnapshot {
            counters: sums.into_iter().collect(),
        }
    }
}
