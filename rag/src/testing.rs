//! Deterministic gateways for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_core::Stream;
use qadex_core::{EmbeddingModel, LanguageModel, llm::Message};

use crate::types::VectorRecord;

/// Embeds by looking up the first line of the text in a table.
#[derive(Debug, Default)]
pub(crate) struct TableEmbedding {
    pub(crate) dimension: usize,
    pub(crate) vectors: HashMap<String, Vec<f32>>,
    /// Keys whose lookup first sleeps for several seconds.
    pub(crate) slow: HashSet<String>,
    pub(crate) calls: AtomicUsize,
}

impl TableEmbedding {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    pub(crate) fn with(mut self, key: &str, vector: &[f32]) -> Self {
        self.vectors.insert(key.to_owned(), vector.to_vec());
        self
    }

    pub(crate) fn slow(mut self, key: &str) -> Self {
        self.slow.insert(key.to_owned());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingModel for TableEmbedding {
    fn dim(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> qadex_core::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = text.lines().next().unwrap_or_default();
        if self.slow.contains(key) {
            async_io::Timer::after(Duration::from_secs(5)).await;
        }
        self.vectors
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no embedding for `{key}`"))
    }
}

/// The three-record dataset used across tests.
pub(crate) fn three_records() -> (TableEmbedding, Vec<VectorRecord>) {
    let embedder = TableEmbedding::new(3)
        .with("q1", &[1.0, 0.0, 0.0])
        .with("q2", &[0.0, 1.0, 0.0])
        .with("q3", &[0.9, 0.1, 0.0]);
    let records = vec![
        VectorRecord::new(1, "q1", "a1", 10),
        VectorRecord::new(2, "q2", "a2", 20),
        VectorRecord::new(3, "q3", "a3", 30),
    ];
    (embedder, records)
}

/// Replies with fixed chunks, then optionally fails or stops responding.
#[derive(Debug, Default)]
pub(crate) struct ScriptedModel {
    pub(crate) chunks: Vec<String>,
    pub(crate) fail_at_end: bool,
    pub(crate) stall_at_end: bool,
    pub(crate) seen: parking_lot::Mutex<Vec<(String, Vec<Message>)>>,
}

impl ScriptedModel {
    pub(crate) fn new(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|&c| c.to_owned()).collect(),
            ..Self::default()
        }
    }
}

impl LanguageModel for ScriptedModel {
    type Error = std::io::Error;

    fn complete(
        &self,
        system: &str,
        messages: &[Message],
    ) -> impl Stream<Item = Result<String, Self::Error>> + Send {
        self.seen
            .lock()
            .push((system.to_owned(), messages.to_vec()));
        let mut items: Vec<Result<String, Self::Error>> =
            self.chunks.iter().cloned().map(Ok).collect();
        if self.fail_at_end {
            items.push(Err(std::io::Error::other("connection reset")));
        }
        let stall = self.stall_at_end;
        async_stream::stream! {
            for item in items {
                yield item;
            }
            if stall {
                std::future::pending::<()>().await;
            }
        }
    }
}
