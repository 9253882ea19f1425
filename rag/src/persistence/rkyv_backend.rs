//! rkyv payload of a persisted index.

use std::collections::HashMap;

use crate::config::IndexConfig;
use crate::index::hnsw::Graph;
use crate::index::{HnswIndex, Metric, ScalarKind, VectorStorage};

/// Everything needed to rebuild an [`HnswIndex`] without re-inserting.
#[derive(Debug, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
pub(super) struct IndexSnapshot {
    dimension: u64,
    metric: u8,
    quantization: u8,
    connectivity: u64,
    expansion_add: u64,
    expansion_search: u64,
    seed: u64,
    keys: Vec<u64>,
    levels: Vec<u8>,
    links: Vec<Vec<Vec<u32>>>,
    entry_point: Option<u32>,
    max_level: u8,
    rng_state: u64,
    storage: VectorStorage,
}

fn to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn to_usize(value: u64, field: &str) -> Result<usize, String> {
    usize::try_from(value).map_err(|_| format!("{field} out of range: {value}"))
}

impl IndexSnapshot {
    pub(super) fn capture(index: &HnswIndex) -> Self {
        let config = index.config();
        let graph = index.graph();
        Self {
            dimension: to_u64(config.dimension),
            metric: config.metric.code(),
            quantization: config.quantization.code(),
            connectivity: to_u64(config.connectivity),
            expansion_add: to_u64(config.expansion_add),
            expansion_search: to_u64(config.expansion_search),
            seed: config.seed,
            keys: graph.keys.clone(),
            levels: graph.levels.clone(),
            links: graph.links.clone(),
            entry_point: graph.entry_point,
            max_level: u8::try_from(graph.max_level).unwrap_or(u8::MAX),
            rng_state: graph.rng_state,
            storage: graph.storage.clone(),
        }
    }

    /// Stored configuration, read before the graph so mismatches are reported first.
    pub(super) fn config(&self) -> Result<IndexConfig, String> {
        let metric = Metric::from_code(self.metric)
            .ok_or_else(|| format!("unknown metric code {}", self.metric))?;
        let quantization = ScalarKind::from_code(self.quantization)
            .ok_or_else(|| format!("unknown scalar kind code {}", self.quantization))?;
        let config = IndexConfig {
            dimension: to_usize(self.dimension, "dimension")?,
            metric,
            quantization,
            connectivity: to_usize(self.connectivity, "connectivity")?,
            expansion_add: to_usize(self.expansion_add, "expansion_add")?,
            expansion_search: to_usize(self.expansion_search, "expansion_search")?,
            seed: self.seed,
        };
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }

    /// Rebuilds the index, checking that the graph is internally consistent.
    pub(super) fn restore(self, config: IndexConfig) -> Result<HnswIndex, String> {
        let count = self.keys.len();
        if self.levels.len() != count || self.links.len() != count {
            return Err("node tables have different lengths".into());
        }
        if self.storage.kind() != config.quantization {
            return Err("vector storage does not match the scalar kind".into());
        }
        if !self.storage.is_consistent(config.dimension, count) {
            return Err("vector storage does not match the node count".into());
        }

        for (slot, (layers, &level)) in self.links.iter().zip(&self.levels).enumerate() {
            if level > self.max_level {
                return Err(format!("node {slot} is above the top layer"));
            }
            if layers.len() != usize::from(level) + 1 {
                return Err("neighbor lists do not match node level".into());
            }
            for (layer, neighbors) in layers.iter().enumerate() {
                for &neighbor in neighbors {
                    let Some(&neighbor_level) = self.levels.get(neighbor as usize) else {
                        return Err("neighbor points outside the graph".into());
                    };
                    if usize::from(neighbor_level) < layer {
                        return Err(format!(
                            "node {slot} links node {neighbor} on layer {layer} above its level"
                        ));
                    }
                }
            }
        }

        match self.entry_point {
            None if count > 0 => return Err("missing entry point".into()),
            Some(entry) if entry as usize >= count => {
                return Err("entry point outside the graph".into());
            }
            Some(entry) if self.levels[entry as usize] != self.max_level => {
                return Err("entry point is not on the top layer".into());
            }
            _ => {}
        }

        let mut slots = HashMap::with_capacity(count);
        for (slot, &key) in self.keys.iter().enumerate() {
            let slot = u32::try_from(slot).map_err(|_| "too many nodes".to_string())?;
            if slots.insert(key, slot).is_some() {
                return Err(format!("key {key} stored twice"));
            }
        }

        let graph = Graph {
            keys: self.keys,
            levels: self.levels,
            links: self.links,
            slots,
            storage: self.storage,
            entry_point: self.entry_point,
            max_level: usize::from(self.max_level),
            rng_state: self.rng_state,
        };
        Ok(HnswIndex::from_parts(config, graph))
    }
}
