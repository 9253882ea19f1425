//! Approximate nearest neighbor index.
//!
//! This module provides the [`VectorIndex`] trait and the [`HnswIndex`]
//! implementation, along with the distance [`Metric`]s and the [`ScalarKind`]s
//! vectors can be stored as.

mod distance;
pub(crate) mod hnsw;
mod storage;

pub use distance::Metric;
pub use hnsw::HnswIndex;
pub use storage::ScalarKind;
pub(crate) use storage::VectorStorage;

use std::sync::Arc;

use crate::error::Result;
use crate::types::SearchHit;

/// Trait for vector index implementations.
///
/// A vector index stores fixed-dimension vectors under integer keys and answers
/// top-k similarity queries, closest first.
pub trait VectorIndex: Send + Sync {
    /// Inserts `vector` under `key`.
    ///
    /// Duplicate keys are rejected with [`RagError::DuplicateKey`](crate::RagError::DuplicateKey).
    fn insert(&self, key: u64, vector: &[f32]) -> Result<()>;

    /// Searches for the keys whose vectors are closest to `query`.
    ///
    /// Returns `min(k, len)` hits in ascending distance order.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Returns the vector dimension.
    fn dimension(&self) -> usize;

    /// Returns the number of indexed vectors.
    fn len(&self) -> usize;

    /// Returns `true` if the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `key` is indexed.
    fn contains(&self, key: u64) -> bool;
}

macro_rules! impl_vector_index {
    ($($ty:ty),*) => {
        $(
            impl<T: VectorIndex + ?Sized> VectorIndex for $ty {
                fn insert(&self, key: u64, vector: &[f32]) -> Result<()> {
                    T::insert(self, key, vector)
                }

                fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
                    T::search(self, query, k)
                }

                fn dimension(&self) -> usize {
                    T::dimension(self)
                }

                fn len(&self) -> usize {
                    T::len(self)
                }

                fn contains(&self, key: u64) -> bool {
                    T::contains(self, key)
                }
            }
        )*
    };
}

impl_vector_index!(&T, Arc<T>, Box<T>);
