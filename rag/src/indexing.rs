//! Bulk index construction from a record store, with progress tracking.

use std::path::Path;
use std::time::Duration;

use qadex_core::EmbeddingModel;
use tracing::{debug, info, warn};

use crate::config::IndexConfig;
use crate::error::{RagError, Result};
use crate::gateway;
use crate::index::HnswIndex;
use crate::records::RecordStore;

/// Progress update during an index build.
#[derive(Debug, Clone)]
pub struct BuildProgress {
    /// Number of records processed so far.
    pub processed: usize,
    /// Total number of records.
    pub total: usize,
    /// Record being processed, if any.
    pub current: Option<u64>,
    /// Current stage of the build.
    pub stage: BuildStage,
}

impl BuildProgress {
    /// Creates a new progress update.
    #[must_use]
    pub const fn new(
        processed: usize,
        total: usize,
        current: Option<u64>,
        stage: BuildStage,
    ) -> Self {
        Self {
            processed,
            total,
            current,
            stage,
        }
    }
}

/// Stages of an index build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStage {
    /// Requesting the embedding of the current record.
    Embedding,
    /// The current record was added to the index.
    Inserted,
    /// The current record was left out.
    Skipped {
        /// Reason the record was skipped.
        reason: String,
    },
    /// Writing the index to disk.
    Saving,
    /// The build completed.
    Done,
    /// An existing index file was loaded instead of building.
    Loaded,
}

/// A record left out of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// Record identifier.
    pub id: u64,
    /// Why it was skipped.
    pub reason: String,
}

/// Outcome of [`IndexBuilder::open`] and friends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Records inserted during this run.
    pub inserted: usize,
    /// Records that failed to embed or insert.
    pub skipped: Vec<SkippedRecord>,
    /// Whether the index came from an existing file.
    pub loaded: bool,
}

/// Populates an [`HnswIndex`] from a [`RecordStore`], one embedding call per record.
///
/// A record whose embedding fails, times out, has the wrong length or repeats an
/// identifier is skipped and reported; the build carries on with the next record.
/// Errors reading the record store abort the build.
#[derive(Debug)]
pub struct IndexBuilder<M, S> {
    embedder: M,
    records: S,
    config: IndexConfig,
    gateway_timeout: Option<Duration>,
}

impl<M, S> IndexBuilder<M, S>
where
    M: EmbeddingModel,
    S: RecordStore,
{
    /// Creates a builder.
    #[must_use]
    pub const fn new(embedder: M, records: S, config: IndexConfig) -> Self {
        Self {
            embedder,
            records,
            config,
            gateway_timeout: None,
        }
    }

    /// Limits each embedding call to `timeout`.
    #[must_use]
    pub const fn gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = Some(timeout);
        self
    }

    /// Returns the index configuration.
    #[must_use]
    pub const fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Loads the index at `path` if the file exists, otherwise builds and saves it.
    ///
    /// An existing file is never rebuilt, even if the record store changed since.
    ///
    /// # Errors
    ///
    /// - [`RagError::Format`] if the existing file is corrupt or was built with a
    ///   different configuration.
    /// - Any error of [`build_and_save`](Self::build_and_save).
    pub async fn open(
        &self,
        path: impl AsRef<Path>,
        mut progress: impl FnMut(BuildProgress),
    ) -> Result<(HnswIndex, BuildReport)> {
        let path = path.as_ref();
        if path.exists() {
            let index = HnswIndex::load_with(path, &self.config)?;
            let len = index.len();
            progress(BuildProgress::new(len, len, None, BuildStage::Loaded));
            return Ok((
                index,
                BuildReport {
                    loaded: true,
                    ..BuildReport::default()
                },
            ));
        }
        self.build_and_save(path, progress).await
    }

    /// Builds the index in memory.
    ///
    /// # Errors
    ///
    /// - [`RagError::Config`] if the configuration is invalid or its dimension differs
    ///   from the embedding model's.
    /// - [`RagError::Records`] if the record store cannot be read.
    pub async fn build(
        &self,
        mut progress: impl FnMut(BuildProgress),
    ) -> Result<(HnswIndex, BuildReport)> {
        let (index, report, total) = self.populate(&mut progress).await?;
        progress(BuildProgress::new(total, total, None, BuildStage::Done));
        Ok((index, report))
    }

    /// Builds the index and writes it to `path` once every record was processed.
    ///
    /// Nothing is written if the build fails.
    ///
    /// # Errors
    ///
    /// Everything [`build`](Self::build) returns, plus [`RagError::Storage`] if the
    /// file cannot be written.
    pub async fn build_and_save(
        &self,
        path: impl AsRef<Path>,
        mut progress: impl FnMut(BuildProgress),
    ) -> Result<(HnswIndex, BuildReport)> {
        let path = path.as_ref();
        let (index, report, total) = self.populate(&mut progress).await?;

        progress(BuildProgress::new(total, total, None, BuildStage::Saving));
        index.save(path)?;
        progress(BuildProgress::new(total, total, None, BuildStage::Done));
        Ok((index, report))
    }

    async fn populate(
        &self,
        progress: &mut impl FnMut(BuildProgress),
    ) -> Result<(HnswIndex, BuildReport, usize)> {
        if self.embedder.dim() != self.config.dimension {
            return Err(RagError::Config(format!(
                "embedding model produces {} dimensions but the index expects {}",
                self.embedder.dim(),
                self.config.dimension
            )));
        }
        let index = HnswIndex::new(self.config.clone())?;
        let records = self.records.all()?;
        let total = records.len();
        let mut report = BuildReport::default();

        info!(records = total, "building vector index");

        for (processed, record) in records.iter().enumerate() {
            let id = record.id;
            progress(BuildProgress::new(processed, total, Some(id), BuildStage::Embedding));

            let outcome =
                gateway::embed(&self.embedder, &record.embedding_text(), self.gateway_timeout)
                    .await
                    .and_then(|vector| index.insert(id, &vector));

            let stage = match outcome {
                Ok(()) => {
                    report.inserted += 1;
                    debug!(id, "inserted record into vector index");
                    BuildStage::Inserted
                }
                Err(e @ (RagError::Config(_) | RagError::Records(_))) => return Err(e),
                Err(e) => {
                    warn!(id, error = %e, "skipping record");
                    let reason = e.to_string();
                    report.skipped.push(SkippedRecord {
                        id,
                        reason: reason.clone(),
                    });
                    BuildStage::Skipped { reason }
                }
            };
            progress(BuildProgress::new(processed + 1, total, Some(id), stage));
        }

        info!(
            inserted = report.inserted,
            skipped = report.skipped.len(),
            "finished building vector index"
        );
        Ok((index, report, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::MemoryRecordStore;
    use crate::testing::{TableEmbedding, three_records};
    use crate::types::VectorRecord;
    use tempfile::tempdir;

    fn builder(
        embedder: TableEmbedding,
        records: Vec<VectorRecord>,
    ) -> IndexBuilder<TableEmbedding, MemoryRecordStore> {
        IndexBuilder::new(
            embedder,
            MemoryRecordStore::from_records(records),
            IndexConfig::new(3),
        )
    }

    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn all(&self) -> Result<Vec<VectorRecord>> {
            Err(RagError::Records(anyhow::anyhow!("database is locked")))
        }

        fn by_id(&self, _id: u64) -> Result<Option<VectorRecord>> {
            Ok(None)
        }

        fn len(&self) -> Result<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn builds_every_record() {
        let (embedder, records) = three_records();
        let mut stages = Vec::new();

        let (index, report) = builder(embedder, records)
            .build(|p| stages.push(p.stage))
            .await
            .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(report.inserted, 3);
        assert!(report.skipped.is_empty());
        assert!(!report.loaded);
        assert_eq!(stages.iter().filter(|s| **s == BuildStage::Inserted).count(), 3);
        assert_eq!(stages.last(), Some(&BuildStage::Done));

        let keys: Vec<u64> = index
            .search(&[1.0, 0.0, 0.0], 2)
            .unwrap()
            .iter()
            .map(|hit| hit.key)
            .collect();
        assert_eq!(keys, vec![1, 3]);
    }

    #[tokio::test]
    async fn failed_embeddings_are_skipped() {
        let (embedder, mut records) = three_records();
        records.insert(1, VectorRecord::new(4, "unknown", "a4", 0));
        records.push(VectorRecord::new(1, "q1", "duplicate", 0));

        let mut skipped_stages = 0;
        let (index, report) = builder(embedder, records)
            .build(|p| {
                if matches!(p.stage, BuildStage::Skipped { .. }) {
                    skipped_stages += 1;
                }
            })
            .await
            .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(report.inserted, 3);
        let skipped: Vec<u64> = report.skipped.iter().map(|s| s.id).collect();
        assert_eq!(skipped, vec![4, 1]);
        assert!(report.skipped[0].reason.contains("embedding failed"));
        assert!(report.skipped[1].reason.contains("duplicate key"));
        assert_eq!(skipped_stages, 2);
        assert!(!index.contains(4));
    }

    #[tokio::test]
    async fn slow_embedding_is_skipped() {
        let (embedder, records) = three_records();
        let embedder = embedder.slow("q2");

        let (index, report) = builder(embedder, records)
            .gateway_timeout(Duration::from_millis(50))
            .build(|_| {})
            .await
            .unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, 2);
        assert!(
            report.skipped[0]
                .reason
                .contains("embedding gateway timed out"),
            "{}",
            report.skipped[0].reason
        );
        assert!(!index.contains(2));
        assert!(index.contains(3));
    }

    #[tokio::test]
    async fn open_builds_once_then_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.vdb");
        let (embedder, records) = three_records();
        let builder = builder(embedder, records);

        let (_, first) = builder.open(&path, |_| {}).await.unwrap();
        assert!(!first.loaded);
        assert_eq!(first.inserted, 3);
        assert!(path.exists());
        assert_eq!(builder.embedder.calls(), 3);

        let mut stages = Vec::new();
        let (index, second) = builder.open(&path, |p| stages.push(p.stage)).await.unwrap();
        assert!(second.loaded);
        assert_eq!(second.inserted, 0);
        assert_eq!(stages, vec![BuildStage::Loaded]);
        assert_eq!(builder.embedder.calls(), 3);
        assert_eq!(index.search(&[0.0, 1.0, 0.0], 1).unwrap()[0].key, 2);
    }

    #[tokio::test]
    async fn failed_build_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.vdb");
        let (embedder, _) = three_records();

        let builder = IndexBuilder::new(embedder, BrokenStore, IndexConfig::new(3));
        let err = builder.open(&path, |_| {}).await.unwrap_err();
        assert!(matches!(err, RagError::Records(_)));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn embedder_dimension_must_match() {
        let (embedder, records) = three_records();
        let builder = IndexBuilder::new(
            embedder,
            MemoryRecordStore::from_records(records),
            IndexConfig::new(1536),
        );
        assert!(matches!(builder.build(|_| {}).await, Err(RagError::Config(_))));
    }

    #[tokio::test]
    async fn incompatible_file_is_not_rebuilt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.vdb");
        std::fs::write(&path, b"garbage").unwrap();

        let (embedder, records) = three_records();
        let err = builder(embedder, records).open(&path, |_| {}).await.unwrap_err();
        assert!(matches!(err, RagError::Format { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"garbage");
    }
}
