//! Core types for the RAG crate.

use serde::{Deserialize, Serialize};

/// A question/answer pair from the dataset, addressed by its identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Identifier, also used as the index key.
    #[serde(alias = "IdConsulta")]
    pub id: u64,
    /// The question as asked.
    #[serde(alias = "Consulta")]
    pub question: String,
    /// The answer given.
    #[serde(alias = "Texto")]
    pub answer: String,
    /// Source article the answer refers to.
    #[serde(alias = "Articulo", default)]
    pub article_id: i64,
}

impl VectorRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(
        id: u64,
        question: impl Into<String>,
        answer: impl Into<String>,
        article_id: i64,
    ) -> Self {
        Self {
            id,
            question: question.into(),
            answer: answer.into(),
            article_id,
        }
    }

    /// Text sent to the embedding model for this record.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.question, self.answer)
    }
}

/// One entry of a search result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchHit {
    /// Key the vector was inserted under.
    pub key: u64,
    /// Distance to the query; lower is closer.
    pub distance: f32,
}
