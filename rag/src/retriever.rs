//! Query-time retrieval: embed, search, resolve.

use std::time::Duration;

use qadex_core::EmbeddingModel;
use tracing::debug;

use crate::config::RagConfig;
use crate::error::Result;
use crate::gateway;
use crate::index::VectorIndex;
use crate::records::RecordStore;

/// A retrieved record with its distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    /// Record identifier.
    pub id: u64,
    /// Distance to the query; lower is closer.
    pub distance: f32,
    /// The record's question.
    pub question: String,
    /// The record's answer.
    pub answer: String,
}

/// Retrieved records, closest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalContext {
    entries: Vec<ContextEntry>,
}

impl RetrievalContext {
    /// Wraps entries that are already in result order.
    #[must_use]
    pub const fn from_entries(entries: Vec<ContextEntry>) -> Self {
        Self { entries }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was retrieved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries, closest first.
    pub fn iter(&self) -> std::slice::Iter<'_, ContextEntry> {
        self.entries.iter()
    }

    /// Iterates over `(question, answer)` pairs, closest first.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|entry| (entry.question.as_str(), entry.answer.as_str()))
    }

    /// Returns the entries.
    #[must_use]
    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }
}

impl IntoIterator for RetrievalContext {
    type Item = ContextEntry;
    type IntoIter = std::vec::IntoIter<ContextEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a RetrievalContext {
    type Item = &'a ContextEntry;
    type IntoIter = std::slice::Iter<'a, ContextEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Resolves a free-text question into the closest records of the dataset.
///
/// Hits whose identifier is missing from the record store are dropped. Results
/// are neither deduplicated nor re-ranked.
#[derive(Debug)]
pub struct Retriever<M, I, S> {
    embedder: M,
    index: I,
    records: S,
    top_k: usize,
    gateway_timeout: Option<Duration>,
}

impl<M, I, S> Retriever<M, I, S>
where
    M: EmbeddingModel,
    I: VectorIndex,
    S: RecordStore,
{
    /// Creates a retriever returning 10 records per query.
    #[must_use]
    pub const fn new(embedder: M, index: I, records: S) -> Self {
        Self {
            embedder,
            index,
            records,
            top_k: 10,
            gateway_timeout: None,
        }
    }

    /// Applies the top-k and timeout settings of `config`.
    #[must_use]
    pub const fn with_config(mut self, config: &RagConfig) -> Self {
        self.top_k = config.default_top_k;
        self.gateway_timeout = config.gateway_timeout;
        self
    }

    /// Sets the number of records [`query`](Self::query) retrieves.
    #[must_use]
    pub const fn top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// Limits each embedding call to `timeout`.
    #[must_use]
    pub const fn gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = Some(timeout);
        self
    }

    /// Returns the configured number of records per query.
    #[must_use]
    pub const fn default_top_k(&self) -> usize {
        self.top_k
    }

    /// Returns the underlying index.
    pub const fn index(&self) -> &I {
        &self.index
    }

    /// Retrieves the configured number of records for `query`.
    ///
    /// # Errors
    ///
    /// See [`retrieve`](Self::retrieve).
    pub async fn query(&self, query: &str) -> Result<RetrievalContext> {
        self.retrieve(query, self.top_k).await
    }

    /// Embeds `query` and retrieves up to `k` records.
    ///
    /// # Errors
    ///
    /// - [`RagError::Embedding`](crate::RagError::Embedding) or
    ///   [`RagError::Timeout`](crate::RagError::Timeout) if the query cannot be embedded.
    /// - [`RagError::DimensionMismatch`](crate::RagError::DimensionMismatch) if the
    ///   embedding does not fit the index.
    /// - [`RagError::Records`](crate::RagError::Records) if the record store fails.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalContext> {
        let vector = gateway::embed(&self.embedder, query, self.gateway_timeout).await?;
        self.retrieve_vector(&vector, k)
    }

    /// Retrieves up to `k` records for an already embedded query.
    ///
    /// # Errors
    ///
    /// See [`retrieve`](Self::retrieve).
    pub fn retrieve_vector(&self, vector: &[f32], k: usize) -> Result<RetrievalContext> {
        let hits = self.index.search(vector, k)?;
        let mut entries = Vec::with_capacity(hits.len());

        for hit in hits {
            debug!(id = hit.key, distance = hit.distance, "search hit");
            match self.records.by_id(hit.key)? {
                Some(record) => entries.push(ContextEntry {
                    id: record.id,
                    distance: hit.distance,
                    question: record.question,
                    answer: record.answer,
                }),
                None => debug!(id = hit.key, "no record for search hit"),
            }
        }

        Ok(RetrievalContext::from_entries(entries))
    }
}
