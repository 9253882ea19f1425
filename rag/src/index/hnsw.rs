//! Hierarchical navigable small world graph over a quantized vector arena.
//!
//! Nodes are dense `u32` slots. Slot `s` owns `keys[s]`, `levels[s]`, the vector at
//! `storage[s]` and one neighbor list per layer in `links[s]`. Edges are slot numbers,
//! so the graph holds no references into itself.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use ordered_float::OrderedFloat;
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::debug;

use crate::config::{IndexConfig, MAX_LEVEL};
use crate::error::{RagError, Result};
use crate::types::SearchHit;

use super::VectorIndex;
use super::storage::VectorStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    distance: OrderedFloat<f32>,
    slot: u32,
}

/// Graph state guarded by the index lock.
#[derive(Debug)]
pub(crate) struct Graph {
    pub(crate) keys: Vec<u64>,
    pub(crate) levels: Vec<u8>,
    /// `links[slot][layer]`
    pub(crate) links: Vec<Vec<Vec<u32>>>,
    pub(crate) slots: HashMap<u64, u32>,
    pub(crate) storage: VectorStorage,
    pub(crate) entry_point: Option<u32>,
    pub(crate) max_level: usize,
    pub(crate) rng_state: u64,
}

impl Graph {
    fn empty(config: &IndexConfig) -> Self {
        Self {
            keys: Vec::new(),
            levels: Vec::new(),
            links: Vec::new(),
            slots: HashMap::new(),
            storage: VectorStorage::new(config.quantization),
            entry_point: None,
            max_level: 0,
            rng_state: config.seed,
        }
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    #[allow(clippy::cast_precision_loss)]
    fn next_random(&mut self) -> f64 {
        self.rng_state = self
            .rng_state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        // 53 high bits mapped onto (0, 1]
        ((self.rng_state >> 11) as f64 + 1.0) / (1u64 << 53) as f64
    }

    fn random_level(&mut self, level_mult: f64) -> usize {
        let level = (-self.next_random().ln() * level_mult).floor();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let level = level as usize;
        level.min(MAX_LEVEL)
    }

    fn distance_to(&self, config: &IndexConfig, query: &[f32], slot: u32) -> f32 {
        let vector = self.storage.get(slot as usize, config.dimension);
        config.metric.distance(query, &vector)
    }

    fn neighbors(&self, slot: u32, layer: usize) -> &[u32] {
        self.links[slot as usize]
            .get(layer)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Best-first beam search on one layer. Returns up to `ef` candidates, nearest first.
    fn search_layer(
        &self,
        config: &IndexConfig,
        query: &[f32],
        entry: u32,
        ef: usize,
        layer: usize,
    ) -> Vec<Candidate> {
        let mut visited = HashSet::new();
        let mut frontier = BinaryHeap::new();
        let mut found = BinaryHeap::new();

        let start = Candidate {
            distance: OrderedFloat(self.distance_to(config, query, entry)),
            slot: entry,
        };
        visited.insert(entry);
        frontier.push(Reverse(start));
        found.push(start);

        while let Some(Reverse(current)) = frontier.pop() {
            if let Some(furthest) = found.peek() {
                if found.len() >= ef && current.distance > furthest.distance {
                    break;
                }
            }

            for &neighbor in self.neighbors(current.slot, layer) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let candidate = Candidate {
                    distance: OrderedFloat(self.distance_to(config, query, neighbor)),
                    slot: neighbor,
                };
                let admits = found.len() < ef
                    || found
                        .peek()
                        .is_some_and(|furthest| candidate.distance < furthest.distance);
                if admits {
                    frontier.push(Reverse(candidate));
                    found.push(candidate);
                    if found.len() > ef {
                        found.pop();
                    }
                }
            }
        }

        found.into_sorted_vec()
    }

    /// Greedy descent from `entry` through the layers above `target`.
    fn descend(&self, config: &IndexConfig, query: &[f32], entry: u32, target: usize) -> u32 {
        let mut current = entry;
        for layer in (target + 1..=self.max_level).rev() {
            if let Some(best) = self.search_layer(config, query, current, 1, layer).first() {
                current = best.slot;
            }
        }
        current
    }

    /// Diversity heuristic: keep a candidate only if it is closer to the base than to every
    /// neighbor kept so far, then fill the remaining room with the nearest rejects.
    fn select_neighbors(&self, config: &IndexConfig, candidates: &[Candidate], m: usize) -> Vec<u32> {
        let mut selected: Vec<Candidate> = Vec::with_capacity(m);
        let mut rejected = Vec::new();

        for &candidate in candidates {
            if selected.len() >= m {
                break;
            }
            let vector = self.storage.get(candidate.slot as usize, config.dimension);
            let diverse = selected.iter().all(|kept| {
                OrderedFloat(self.distance_to(config, &vector, kept.slot)) > candidate.distance
            });
            if diverse {
                selected.push(candidate);
            } else {
                rejected.push(candidate);
            }
        }

        for candidate in rejected {
            if selected.len() >= m {
                break;
            }
            selected.push(candidate);
        }

        selected.into_iter().map(|candidate| candidate.slot).collect()
    }

    /// Re-selects the neighbors of `slot` on `layer` once the list exceeds its cap.
    fn shrink(&mut self, config: &IndexConfig, slot: u32, layer: usize) {
        let cap = config.max_links(layer);
        if self.neighbors(slot, layer).len() <= cap {
            return;
        }

        let base = self.storage.get(slot as usize, config.dimension).into_owned();
        let mut candidates: Vec<Candidate> = self
            .neighbors(slot, layer)
            .iter()
            .map(|&neighbor| Candidate {
                distance: OrderedFloat(self.distance_to(config, &base, neighbor)),
                slot: neighbor,
            })
            .collect();
        candidates.sort_unstable();

        let kept = self.select_neighbors(config, &candidates, cap);
        self.links[slot as usize][layer] = kept;
    }

    fn insert(&mut self, config: &IndexConfig, level_mult: f64, key: u64, vector: &[f32]) -> Result<()> {
        if self.slots.contains_key(&key) {
            return Err(RagError::DuplicateKey(key));
        }
        let slot = u32::try_from(self.len())
            .map_err(|_| RagError::Config("index is full".into()))?;
        let level = self.random_level(level_mult);

        self.keys.push(key);
        self.levels.push(u8::try_from(level).unwrap_or(u8::MAX));
        self.links.push(vec![Vec::new(); level + 1]);
        self.storage.push(vector);
        self.slots.insert(key, slot);

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(slot);
            self.max_level = level;
            return Ok(());
        };

        // Link against the stored representation so quantized indexes stay self-consistent.
        let point = self.storage.get(slot as usize, config.dimension).into_owned();
        let mut current = self.descend(config, &point, entry, level);

        for layer in (0..=level.min(self.max_level)).rev() {
            let candidates = self.search_layer(config, &point, current, config.expansion_add, layer);
            let neighbors = self.select_neighbors(config, &candidates, config.connectivity);

            for &neighbor in &neighbors {
                self.links[neighbor as usize][layer].push(slot);
                self.shrink(config, neighbor, layer);
            }
            self.links[slot as usize][layer] = neighbors;

            if let Some(nearest) = candidates.first() {
                current = nearest.slot;
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(slot);
        }
        Ok(())
    }

    fn search(&self, config: &IndexConfig, query: &[f32], k: usize, expansion: usize) -> Vec<SearchHit> {
        let Some(entry) = self.entry_point else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let entry = self.descend(config, query, entry, 0);
        let mut found = self.search_layer(config, query, entry, expansion.max(k), 0);

        // Unreachable nodes must not shrink the result below min(k, len).
        let wanted = k.min(self.len());
        if found.len() < wanted {
            let seen: HashSet<u32> = found.iter().map(|candidate| candidate.slot).collect();
            for slot in 0..self.len() {
                #[allow(clippy::cast_possible_truncation)]
                let slot = slot as u32;
                if !seen.contains(&slot) {
                    found.push(Candidate {
                        distance: OrderedFloat(self.distance_to(config, query, slot)),
                        slot,
                    });
                }
            }
        }

        let mut hits: Vec<SearchHit> = found
            .into_iter()
            .map(|candidate| SearchHit {
                key: self.keys[candidate.slot as usize],
                distance: candidate.distance.0,
            })
            .collect();
        hits.sort_by(|a, b| {
            OrderedFloat(a.distance)
                .cmp(&OrderedFloat(b.distance))
                .then(a.key.cmp(&b.key))
        });
        hits.truncate(k);
        hits
    }

    fn memory_usage(&self) -> usize {
        let links: usize = self
            .links
            .iter()
            .flatten()
            .map(|layer| layer.capacity() * size_of::<u32>() + size_of::<Vec<u32>>())
            .sum();
        self.storage.memory_usage()
            + links
            + self.keys.capacity() * size_of::<u64>()
            + self.levels.capacity()
            + self.slots.capacity() * (size_of::<u64>() + size_of::<u32>())
    }
}

/// Approximate nearest neighbor index backed by an HNSW graph.
///
/// Inserts take the write lock and searches the read lock, so one writer and any
/// number of concurrent readers are safe.
#[derive(Debug)]
pub struct HnswIndex {
    config: IndexConfig,
    level_mult: f64,
    state: RwLock<Graph>,
}

impl HnswIndex {
    /// Creates an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the configuration is invalid.
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let graph = Graph::empty(&config);
        Ok(Self::from_parts(config, graph))
    }

    pub(crate) fn from_parts(config: IndexConfig, graph: Graph) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let level_mult = 1.0 / (config.connectivity as f64).ln();
        Self {
            config,
            level_mult,
            state: RwLock::new(graph),
        }
    }

    pub(crate) fn graph(&self) -> RwLockReadGuard<'_, Graph> {
        self.state.read()
    }

    /// Returns the configuration the index was created with.
    #[must_use]
    pub const fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Returns the vector dimension.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Returns the number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    /// Returns `true` if nothing has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `key` is indexed.
    #[must_use]
    pub fn contains(&self, key: u64) -> bool {
        self.state.read().slots.contains_key(&key)
    }

    /// Returns the stored vector for `key`, decoded to `f32`.
    #[must_use]
    pub fn get(&self, key: u64) -> Option<Vec<f32>> {
        let graph = self.state.read();
        let slot = *graph.slots.get(&key)?;
        Some(graph.storage.get(slot as usize, self.config.dimension).into_owned())
    }

    /// Approximate number of bytes held by the index.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.state.read().memory_usage()
    }

    /// Inserts `vector` under `key`.
    ///
    /// # Errors
    ///
    /// - [`RagError::DimensionMismatch`] if the vector length differs from the dimension.
    /// - [`RagError::DuplicateKey`] if `key` is already indexed; the index is left unchanged.
    pub fn insert(&self, key: u64, vector: &[f32]) -> Result<()> {
        self.check_dimension(vector)?;
        self.state
            .write()
            .insert(&self.config, self.level_mult, key, vector)
    }

    /// Returns up to `k` nearest keys, closest first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the query length differs from the dimension.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.search_with_expansion(query, k, self.config.expansion_search)
    }

    /// Like [`search`](Self::search) with a per-call candidate list size.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the query length differs from the dimension.
    pub fn search_with_expansion(
        &self,
        query: &[f32],
        k: usize,
        expansion: usize,
    ) -> Result<Vec<SearchHit>> {
        self.check_dimension(query)?;
        let hits = self.state.read().search(&self.config, query, k, expansion);
        debug!(k, expansion, hits = hits.len(), "searched vector index");
        Ok(hits)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() == self.config.dimension {
            Ok(())
        } else {
            Err(RagError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            })
        }
    }
}

impl VectorIndex for HnswIndex {
    fn insert(&self, key: u64, vector: &[f32]) -> Result<()> {
        Self::insert(self, key, vector)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        Self::search(self, query, k)
    }

    fn dimension(&self) -> usize {
        Self::dimension(self)
    }

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn contains(&self, key: u64) -> bool {
        Self::contains(self, key)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::index::{Metric, ScalarKind};
    use std::sync::Arc;

    /// Deterministic vectors with components in `[-1, 1)`.
    pub(crate) fn random_vectors(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut state = seed;
        (0..count)
            .map(|_| {
                (0..dimension)
                    .map(|_| {
                        state = state
                            .wrapping_mul(6_364_136_223_846_793_005)
                            .wrapping_add(1_442_695_040_888_963_407);
                        #[allow(clippy::cast_precision_loss)]
                        let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
                        unit.mul_add(2.0, -1.0)
                    })
                    .collect()
            })
            .collect()
    }

    fn small_config(dimension: usize) -> IndexConfig {
        IndexConfig::builder()
            .dimension(dimension)
            .connectivity(8)
            .expansion_add(64)
            .expansion_search(32)
            .build()
            .unwrap()
    }

    pub(crate) fn filled(config: IndexConfig, vectors: &[Vec<f32>]) -> HnswIndex {
        let index = HnswIndex::new(config).unwrap();
        for (key, vector) in vectors.iter().enumerate() {
            index.insert(key as u64, vector).unwrap();
        }
        index
    }

    #[test]
    fn three_vectors_scenario() {
        let index = HnswIndex::new(IndexConfig::new(3)).unwrap();
        index.insert(1, &[1.0, 0.0, 0.0]).unwrap();
        index.insert(2, &[0.0, 1.0, 0.0]).unwrap();
        index.insert(3, &[0.9, 0.1, 0.0]).unwrap();

        let hits = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        let keys: Vec<u64> = hits.iter().map(|hit| hit.key).collect();
        assert_eq!(keys, vec![1, 3]);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = HnswIndex::new(IndexConfig::new(4)).unwrap();
        assert!(index.is_empty());
        for k in [0, 1, 10] {
            assert!(index.search(&[0.0; 4], k).unwrap().is_empty());
        }
    }

    #[test]
    fn dimension_is_enforced() {
        let index = HnswIndex::new(IndexConfig::new(3)).unwrap();
        assert!(matches!(
            index.insert(1, &[1.0, 0.0]),
            Err(RagError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(matches!(
            index.insert(1, &[1.0, 0.0, 0.0, 0.0]),
            Err(RagError::DimensionMismatch { actual: 4, .. })
        ));
        assert!(index.is_empty());

        index.insert(1, &[1.0, 0.0, 0.0]).unwrap();
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(RagError::DimensionMismatch { .. })
        ));
        assert_eq!(index.search(&[1.0, 0.0, 0.0], 1).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let index = HnswIndex::new(IndexConfig::new(2)).unwrap();
        index.insert(5, &[1.0, 0.0]).unwrap();

        assert!(matches!(
            index.insert(5, &[0.0, 1.0]),
            Err(RagError::DuplicateKey(5))
        ));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(5), Some(vec![1.0, 0.0]));
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(matches!(
            HnswIndex::new(IndexConfig::new(0)),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn every_vector_finds_itself() {
        let vectors = random_vectors(200, 16, 1);
        let index = filled(small_config(16), &vectors);
        assert_eq!(index.len(), 200);

        for (key, vector) in vectors.iter().enumerate() {
            let hits = index.search(vector, 1).unwrap();
            assert_eq!(hits[0].key, key as u64);
        }
    }

    #[test]
    fn result_length_and_order() {
        let vectors = random_vectors(50, 8, 2);
        let index = filled(small_config(8), &vectors);
        let query = &random_vectors(1, 8, 99)[0];

        for k in [1, 5, 50, 80] {
            let hits = index.search(query, k).unwrap();
            assert_eq!(hits.len(), k.min(50));
            assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
        assert!(index.search(query, 0).unwrap().is_empty());
    }

    #[test]
    fn recall_against_brute_force() {
        let vectors = random_vectors(500, 24, 3);
        let config = IndexConfig::builder()
            .dimension(24)
            .metric(Metric::Euclidean)
            .build()
            .unwrap();
        let index = filled(config, &vectors);

        let queries = random_vectors(20, 24, 4);
        let k = 10;
        let mut found = 0;
        for query in &queries {
            let mut exact: Vec<(f32, u64)> = vectors
                .iter()
                .enumerate()
                .map(|(key, v)| (Metric::Euclidean.distance(query, v), key as u64))
                .collect();
            exact.sort_by(|a, b| a.0.total_cmp(&b.0));
            let truth: HashSet<u64> = exact.iter().take(k).map(|(_, key)| *key).collect();

            let hits = index.search(query, k).unwrap();
            found += hits.iter().filter(|hit| truth.contains(&hit.key)).count();
        }

        let recall = found as f64 / (queries.len() * k) as f64;
        assert!(recall >= 0.9, "recall {recall}");
    }

    #[test]
    fn quantized_self_retrieval() {
        let vectors = random_vectors(100, 16, 5);
        let config = IndexConfig::builder()
            .dimension(16)
            .quantization(ScalarKind::I8)
            .build()
            .unwrap();
        let index = filled(config, &vectors);

        for (key, vector) in vectors.iter().enumerate() {
            assert_eq!(index.search(vector, 1).unwrap()[0].key, key as u64);
        }

        let restored = index.get(0).unwrap();
        assert!(
            restored
                .iter()
                .zip(&vectors[0])
                .all(|(a, b)| (a - b).abs() < 0.01)
        );
    }

    #[test]
    fn same_seed_same_graph() {
        let vectors = random_vectors(60, 8, 6);
        let a = filled(small_config(8), &vectors);
        let b = filled(small_config(8), &vectors);

        assert_eq!(a.graph().links, b.graph().links);
        assert_eq!(a.graph().levels, b.graph().levels);
    }

    #[test]
    fn wider_search_is_not_worse() {
        let vectors = random_vectors(300, 12, 7);
        let index = filled(small_config(12), &vectors);
        let query = &random_vectors(1, 12, 8)[0];

        let narrow = index.search_with_expansion(query, 5, 5).unwrap();
        let wide = index.search_with_expansion(query, 5, 200).unwrap();
        assert!(wide[0].distance <= narrow[0].distance);
        assert_eq!(wide.len(), 5);
    }

    #[test]
    fn neighbor_lists_respect_caps() {
        let vectors = random_vectors(200, 8, 9);
        let config = small_config(8);
        let index = filled(config.clone(), &vectors);
        let graph = index.graph();

        for node in &graph.links {
            for (layer, neighbors) in node.iter().enumerate() {
                assert!(neighbors.len() <= config.max_links(layer));
            }
        }
        assert!(graph.max_level <= MAX_LEVEL);
    }

    #[test]
    fn concurrent_searches() {
        let vectors = random_vectors(100, 8, 10);
        let index = Arc::new(filled(small_config(8), &vectors));

        std::thread::scope(|scope| {
            for (key, vector) in vectors.iter().enumerate().take(4) {
                let index = Arc::clone(&index);
                scope.spawn(move || {
                    assert_eq!(index.search(vector, 1).unwrap()[0].key, key as u64);
                });
            }
        });
    }

    #[test]
    fn memory_usage_grows() {
        let index = HnswIndex::new(small_config(8)).unwrap();
        let before = index.memory_usage();
        for (key, vector) in random_vectors(20, 8, 11).iter().enumerate() {
            index.insert(key as u64, vector).unwrap();
        }
        assert!(index.memory_usage() > before);
        assert!(index.contains(19));
        assert!(!index.contains(20));
    }
}
