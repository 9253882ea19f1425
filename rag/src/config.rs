//! Configuration for the vector index and the retrieval pipeline.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RagError, Result};
use crate::index::{Metric, ScalarKind};

/// Hard ceiling on the number of layers a node may occupy.
pub const MAX_LEVEL: usize = 16;

/// Configuration of one index instance. Fixed at creation and checked again on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Number of components of every vector.
    pub dimension: usize,
    /// Distance metric.
    pub metric: Metric,
    /// Storage precision of vector components.
    pub quantization: ScalarKind,
    /// Target number of neighbors per node on the upper layers (M).
    pub connectivity: usize,
    /// Candidate list size explored during insertion.
    pub expansion_add: usize,
    /// Candidate list size explored during search.
    pub expansion_search: usize,
    /// Seed of the level generator.
    pub seed: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: 1536,
            metric: Metric::Cosine,
            quantization: ScalarKind::F32,
            connectivity: 16,
            expansion_add: 128,
            expansion_search: 64,
            seed: 0x5EED_CAFE,
        }
    }
}

impl IndexConfig {
    /// Creates a default configuration for vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    /// Creates a builder for custom configuration.
    #[must_use]
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::new()
    }

    /// Checks that the configuration describes a usable index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] for a zero dimension, a connectivity below 2,
    /// or a zero expansion factor.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(RagError::Config("dimension must be positive".into()));
        }
        if self.connectivity < 2 {
            return Err(RagError::Config(format!(
                "connectivity must be at least 2, got {}",
                self.connectivity
            )));
        }
        if self.expansion_add == 0 || self.expansion_search == 0 {
            return Err(RagError::Config(
                "expansion factors must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Maximum neighbors kept for a node on `layer`.
    pub(crate) const fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.connectivity * 2
        } else {
            self.connectivity
        }
    }
}

/// Builder for [`IndexConfig`].
#[derive(Debug, Default)]
pub struct IndexConfigBuilder {
    config: IndexConfig,
}

impl IndexConfigBuilder {
    /// Creates a builder holding the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the vector dimension.
    #[must_use]
    pub const fn dimension(mut self, dimension: usize) -> Self {
        self.config.dimension = dimension;
        self
    }

    /// Sets the distance metric.
    #[must_use]
    pub const fn metric(mut self, metric: Metric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Sets the storage precision.
    #[must_use]
    pub const fn quantization(mut self, kind: ScalarKind) -> Self {
        self.config.quantization = kind;
        self
    }

    /// Sets the graph connectivity (M).
    #[must_use]
    pub const fn connectivity(mut self, connectivity: usize) -> Self {
        self.config.connectivity = connectivity;
        self
    }

    /// Sets the insertion-time expansion factor.
    #[must_use]
    pub const fn expansion_add(mut self, expansion: usize) -> Self {
        self.config.expansion_add = expansion;
        self
    }

    /// Sets the search-time expansion factor.
    #[must_use]
    pub const fn expansion_search(mut self, expansion: usize) -> Self {
        self.config.expansion_search = expansion;
        self
    }

    /// Sets the level generator seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// See [`IndexConfig::validate`].
    pub fn build(self) -> Result<IndexConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration of the retrieval pipeline around an index.
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Path of the persisted index.
    pub index_path: PathBuf,
    /// Number of hits retrieved per question.
    pub default_top_k: usize,
    /// Limit applied to every gateway call, if any.
    pub gateway_timeout: Option<Duration>,
    /// Index configuration used when building.
    pub index: IndexConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("dataset.vdb"),
            default_top_k: 10,
            gateway_timeout: None,
            index: IndexConfig::default(),
        }
    }
}

impl RagConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for custom configuration.
    #[must_use]
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::new()
    }
}

/// Builder for [`RagConfig`].
#[derive(Debug, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Creates a new configuration builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the index persistence path.
    #[must_use]
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_path = path.into();
        self
    }

    /// Sets the default number of results to return.
    #[must_use]
    pub const fn default_top_k(mut self, k: usize) -> Self {
        self.config.default_top_k = k;
        self
    }

    /// Sets a timeout applied to each embedding and generation call.
    #[must_use]
    pub const fn gateway_timeout(mut self, timeout: Duration) -> Self {
        self.config.gateway_timeout = Some(timeout);
        self
    }

    /// Sets the index configuration.
    #[must_use]
    pub fn index(mut self, index: IndexConfig) -> Self {
        self.config.index = index;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> RagConfig {
        self.config
    }
}
