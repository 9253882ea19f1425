//! OpenAI-compatible gateways for qadex, built on `reqwest` and the shared `qadex-core`
//! abstractions.
//!
//! [`OpenAI`] implements both [`EmbeddingModel`](qadex_core::EmbeddingModel), through the
//! `/embeddings` endpoint, and [`LanguageModel`](qadex_core::LanguageModel), through streaming
//! `/chat/completions`. Any server speaking the same protocol, such as a local proxy,
//! works by overriding the base URL.
//!
//! ```no_run
//! use qadex_core::{EmbeddingModel, LanguageModel, llm::Message};
//! use qadex_openai::OpenAI;
//! use futures_lite::StreamExt;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let model = OpenAI::new(std::env::var("OPENAI_API_KEY")?)
//!     .with_model("gpt-4o-mini");
//!
//! let vector = model.embed("¿Cómo restablezco mi contraseña?").await?;
//! assert_eq!(vector.len(), model.dim());
//!
//! let messages = [Message::user("Explain the Rust ownership model in one paragraph.")];
//! let mut stream = std::pin::pin!(model.complete("You are a concise assistant.", &messages));
//! let mut collected = String::new();
//! while let Some(chunk) = stream.next().await {
//!     collected.push_str(&chunk?);
//! }
//! println!("{collected}");
//! # Ok(()) }
//! ```

mod chat;
mod client;
mod embedding;
mod error;
mod request;
mod response;

pub use client::{Builder, OpenAI, RetryConfig};
pub use error::OpenAIError;

mod constant;
pub use constant::*;

pub(crate) const DEFAULT_MODEL: &str = GPT4O_MINI;
pub(crate) const DEFAULT_BASE_URL: &str = OPENAI_BASE_URL;
pub(crate) const DEFAULT_EMBEDDING_MODEL: &str = EMBEDDING_SMALL;
pub(crate) const DEFAULT_EMBEDDING_DIM: usize = 1536;
