use crate::{
    client::{Config, OpenAI, send_with_retry},
    error::OpenAIError,
};
use qadex_core::{EmbeddingModel, Result as CoreResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

impl EmbeddingModel for OpenAI {
    fn dim(&self) -> usize {
        self.config().embedding_dimensions
    }

    fn embed(&self, text: &str) -> impl core::future::Future<Output = CoreResult<Vec<f32>>> + Send {
        let cfg = self.config();
        let input = text.to_owned();
        async move {
            let vector = embed_once(cfg, input).await?;
            Ok(vector)
        }
    }
}

async fn embed_once(cfg: Arc<Config>, input: String) -> Result<Vec<f32>, OpenAIError> {
    if input.trim().is_empty() {
        return Err(OpenAIError::EmptyInput);
    }

    let request = EmbeddingRequest {
        model: &cfg.embedding_model,
        input: &input,
        dimensions: cfg.requested_dimensions,
    };
    let response = send_with_retry(&cfg, || cfg.post("/embeddings").json(&request)).await?;
    let body = response.bytes().await?;
    let response: EmbeddingResponse = serde_json::from_slice(&body)?;
    response
        .data
        .into_iter()
        .next()
        .map(|item| item.embedding)
        .ok_or_else(|| OpenAIError::Api("embedding response missing vector data".into()))
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}
