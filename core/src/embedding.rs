//! # Embedding Module
//!
//! An embedding model turns a piece of text into a dense vector whose geometry reflects the
//! meaning of the text: similar questions land close to each other under cosine distance.
//! qadex uses embeddings twice:
//!
//! - **Index build time**: every question/answer record is embedded once and inserted into the
//!   approximate nearest neighbor index.
//! - **Query time**: the user's question is embedded and used as the search vector.
//!
//! Both sides must use the same model, otherwise the vectors live in different spaces and the
//! dimension check of the index rejects them.
//!
//! ```rust
//! use qadex_core::EmbeddingModel;
//!
//! async fn example<T: EmbeddingModel>(model: &T) -> qadex_core::Result<()> {
//!     let dim = model.dim();
//!     let embedding = model.embed("Hello, world!").await?;
//!     assert_eq!(embedding.len(), dim);
//!     Ok(())
//! }
//! ```

use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::future::Future;

/// A type alias for an embedding vector of 32-bit floats.
pub type Embedding = Vec<f32>;

/// Converts text to vector representations.
///
/// # Implementation Requirements
///
/// - The [`embed`](EmbeddingModel::embed) method must return vectors with length equal to [`dim`](EmbeddingModel::dim)
/// - Network failures, rate limits and invalid input (such as empty text) are all reported as an
///   error; callers treat every failure as "embedding unavailable".
///
/// # Example
///
/// ```rust
/// use qadex_core::EmbeddingModel;
///
/// struct Constant;
///
/// impl EmbeddingModel for Constant {
///     fn dim(&self) -> usize {
///         3
///     }
///
///     async fn embed(&self, _text: &str) -> qadex_core::Result<Vec<f32>> {
///         Ok(vec![1.0, 0.0, 0.0])
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let embedding = Constant.embed("anything").await.unwrap();
/// assert_eq!(embedding.len(), 3);
/// # });
/// ```
pub trait EmbeddingModel: Sized + Send + Sync {
    /// Returns the embedding vector dimension.
    ///
    /// Common dimensions include:
    /// - 384 (`Sentence Transformers MiniLM`)
    /// - 1536 (`OpenAI text-embedding-3-small`)
    /// - 3072 (`OpenAI text-embedding-3-large`)
    fn dim(&self) -> usize;

    /// Converts text to an embedding vector.
    ///
    /// # Returns
    ///
    /// A [`Vec<f32>`] with length equal to [`Self::dim`](EmbeddingModel::dim).
    fn embed(&self, text: &str) -> impl Future<Output = crate::Result<Embedding>> + Send;
}

macro_rules! impl_embedding_model {
    ($($name:ident),*) => {
        $(
            impl<T: EmbeddingModel> EmbeddingModel for $name<T> {
                fn dim(&self) -> usize {
                    T::dim(self)
                }

                fn embed(&self, text: &str) -> impl Future<Output = crate::Result<Embedding>> + Send {
                    T::embed(self, text)
                }
            }
        )*
    };
}

impl<T: EmbeddingModel> EmbeddingModel for &T {
    fn dim(&self) -> usize {
        T::dim(self)
    }

    fn embed(&self, text: &str) -> impl Future<Output = crate::Result<Embedding>> + Send {
        T::embed(self, text)
    }
}

impl_embedding_model!(Arc, Box);
