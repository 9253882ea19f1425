//! Read-only access to the question/answer dataset.

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{DEFAULT_TABLE, SqliteRecordStore};

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{RagError, Result};
use crate::types::VectorRecord;

/// Source of [`VectorRecord`]s.
///
/// `all` is read once when building the index, `by_id` once per search hit.
pub trait RecordStore: Send + Sync {
    /// Returns every record in dataset order.
    fn all(&self) -> Result<Vec<VectorRecord>>;

    /// Looks up one record by identifier.
    fn by_id(&self, id: u64) -> Result<Option<VectorRecord>>;

    /// Returns the number of records.
    fn len(&self) -> Result<usize>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn all(&self) -> Result<Vec<VectorRecord>> {
        T::all(self)
    }

    fn by_id(&self, id: u64) -> Result<Option<VectorRecord>> {
        T::by_id(self, id)
    }

    fn len(&self) -> Result<usize> {
        T::len(self)
    }
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn all(&self) -> Result<Vec<VectorRecord>> {
        T::all(self)
    }

    fn by_id(&self, id: u64) -> Result<Option<VectorRecord>> {
        T::by_id(self, id)
    }

    fn len(&self) -> Result<usize> {
        T::len(self)
    }
}

/// Records held in memory, in insertion order.
///
/// Later records with an identifier already seen replace the earlier one in lookups,
/// but both are still returned by [`all`](RecordStore::all).
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Vec<VectorRecord>,
    positions: HashMap<u64, usize>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from records.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = VectorRecord>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.push(record);
        }
        store
    }

    /// Loads a JSON array of records.
    ///
    /// Both `id`/`question`/`answer`/`article_id` and the dataset's original
    /// column names are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Records`] if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            RagError::Records(anyhow::Error::new(e).context(format!("reading {}", path.display())))
        })?;
        let records: Vec<VectorRecord> = serde_json::from_str(&text).map_err(|e| {
            RagError::Records(anyhow::Error::new(e).context(format!("parsing {}", path.display())))
        })?;
        Ok(Self::from_records(records))
    }

    /// Appends a record.
    pub fn push(&mut self, record: VectorRecord) {
        self.positions.insert(record.id, self.records.len());
        self.records.push(record);
    }
}

impl RecordStore for MemoryRecordStore {
    fn all(&self) -> Result<Vec<VectorRecord>> {
        Ok(self.records.clone())
    }

    fn by_id(&self, id: u64) -> Result<Option<VectorRecord>> {
        Ok(self
            .positions
            .get(&id)
            .map(|&position| self.records[position].clone()))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.records.len())
    }
}
