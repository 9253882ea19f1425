#![no_std]
//! # qadex
//!
//! Façade crate for answering support questions from a question/answer dataset. It re-exports
//! everything from [`qadex_core`] and, behind features, the retrieval pipeline and the
//! OpenAI-compatible gateways.
//!
//! ## What's inside?
//!
//! - [`EmbeddingModel`](qadex_core::EmbeddingModel) and [`LanguageModel`](qadex_core::LanguageModel),
//!   the two capabilities every gateway implements.
//! - `rag` (default feature): an HNSW approximate nearest neighbor index with a checksummed
//!   on-disk format, record stores, the index builder, the retriever, prompt assembly and the
//!   streaming support session.
//! - `openai`: embeddings and streaming chat completions against any OpenAI-compatible server.
//! - `sqlite`: reads the dataset straight from its `SQLite` table.
//!
//! ## Example
//!
//! ```rust,ignore
//! use qadex::rag::{IndexBuilder, IndexConfig, Retriever, SqliteRecordStore, SupportSession};
//! use qadex::openai::OpenAI;
//! use qadex::EmbeddingModel;
//! use futures_lite::StreamExt;
//!
//! async fn answer(question: &str) -> anyhow::Result<()> {
//!     let client = OpenAI::new(std::env::var("OPENAI_API_KEY")?);
//!     let records = SqliteRecordStore::open("dataset.db")?;
//!     let config = IndexConfig::builder().dimension(client.dim()).build()?;
//!
//!     let (index, _) = IndexBuilder::new(&client, &records, config)
//!         .open("dataset.vdb", |_| {})
//!         .await?;
//!     let session = SupportSession::new(Retriever::new(client.clone(), index, records), client);
//!
//!     let mut answer = std::pin::pin!(session.ask(question));
//!     while let Some(chunk) = answer.next().await {
//!         print!("{}", chunk?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`qadex_core::embedding`]: convert text to vectors.
//! - [`qadex_core::llm`]: conversation messages and streaming text generation.

pub use qadex_core::*;

/// Index, retrieval and question answering.
#[cfg(feature = "rag")]
pub use qadex_rag as rag;

/// OpenAI-compatible gateways.
#[cfg(feature = "openai")]
pub use qadex_openai as openai;

#[cfg(all(test, feature = "rag"))]
mod tests {
    extern crate std;

    use super::rag::{HnswIndex, IndexConfig, Metric};

    #[test]
    fn facade_reaches_the_index() {
        let config = IndexConfig::builder()
            .dimension(2)
            .metric(Metric::Euclidean)
            .build()
            .unwrap();
        let index = HnswIndex::new(config).unwrap();
        index.insert(7, &[0.0, 0.0]).unwrap();
        index.insert(9, &[3.0, 4.0]).unwrap();

        let hits = index.search(&[2.9, 4.1], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].key, 9);
        assert_eq!(hits[1].key, 7);
        assert!((hits[1].distance - 5.0).abs() < 0.2);
        assert_eq!(index.len(), 2);
    }
}
