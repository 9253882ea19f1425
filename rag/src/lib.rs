//! Question/answer retrieval over an approximate nearest neighbor index.
//!
//! The pieces, leaves first:
//!
//! - [`HnswIndex`]: a hierarchical navigable small world graph over quantized vectors,
//!   persisted to a single checksummed file.
//! - [`RecordStore`]: read-only access to the question/answer dataset
//!   ([`MemoryRecordStore`], and `SqliteRecordStore` behind the `sqlite` feature).
//! - [`IndexBuilder`]: embeds every record once and saves the index; an existing
//!   index file is loaded instead.
//! - [`Retriever`]: embeds a question, searches the index and resolves the hits.
//! - [`PromptTemplate`] and [`SupportSession`]: render the retrieved pairs into a prompt
//!   and stream the answer from a [`LanguageModel`](qadex_core::LanguageModel).
//!
//! ```rust,no_run
//! use qadex_core::EmbeddingModel;
//! use qadex_rag::{IndexBuilder, IndexConfig, MemoryRecordStore, Retriever};
//!
//! async fn ask<M: EmbeddingModel>(embedder: M) -> qadex_rag::Result<()> {
//!     let records = MemoryRecordStore::from_json_file("dataset.json")?;
//!     let builder = IndexBuilder::new(&embedder, &records, IndexConfig::new(embedder.dim()));
//!     let (index, _report) = builder.open("dataset.vdb", |_| {}).await?;
//!
//!     let retriever = Retriever::new(&embedder, index, &records);
//!     for entry in &retriever.retrieve("How do I reset my password?", 3).await? {
//!         println!("{}\t{}", entry.id, entry.distance);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
mod gateway;
pub mod index;
pub mod indexing;
mod persistence;
pub mod prompt;
pub mod records;
pub mod retriever;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::{IndexConfig, IndexConfigBuilder, RagConfig, RagConfigBuilder};
pub use error::{ErrorKind, Gateway, RagError, Result};
pub use index::{HnswIndex, Metric, ScalarKind, VectorIndex};
pub use indexing::{BuildProgress, BuildReport, BuildStage, IndexBuilder, SkippedRecord};
pub use prompt::PromptTemplate;
pub use records::{MemoryRecordStore, RecordStore};
#[cfg(feature = "sqlite")]
pub use records::SqliteRecordStore;
pub use retriever::{ContextEntry, RetrievalContext, Retriever};
pub use session::{PreparedQuestion, SupportSession};
pub use types::{SearchHit, VectorRecord};
