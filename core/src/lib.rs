//! # qadex-core
//!
//! Capability traits shared by every qadex crate. The retrieval pipeline never talks to a network
//! service directly; it only sees two capabilities:
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │  Index builder  │───▶│   qadex-core     │◀───│    Gateways     │
//! │  Retriever      │    │                  │    │                 │
//! │  Support bot    │    │ - EmbeddingModel │    │ - OpenAI        │
//! │                 │    │ - LanguageModel  │    │ - test fakes    │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//! ```
//!
//! | Capability | Trait | Description |
//! |------------|-------|-------------|
//! | **Embeddings** | [`EmbeddingModel`] | Convert text to a fixed-length vector |
//! | **Generation** | [`LanguageModel`] | Stream text chunks for a system instruction and a conversation |
//!
//! Both traits are deliberately small so that tests can substitute deterministic fakes.
//!
//! ## Example
//!
//! ```rust
//! use qadex_core::{LanguageModel, llm::Message};
//! use futures_lite::StreamExt;
//!
//! async fn answer(model: impl LanguageModel) -> qadex_core::Result {
//!     let messages = [Message::user("How do I reset my password?")];
//!     let mut stream = core::pin::pin!(model.complete("You are a support bot.", &messages));
//!     let mut answer = String::new();
//!     while let Some(chunk) = stream.next().await {
//!         answer.push_str(&chunk?);
//!     }
//!     Ok(answer)
//! }
//! ```

#![no_std]
extern crate alloc;

/// Text embeddings.
pub mod embedding;
pub mod llm;

use alloc::string::String;

#[doc(inline)]
pub use embedding::EmbeddingModel;
#[doc(inline)]
pub use llm::LanguageModel;

/// Result type used throughout the crate.
///
/// Type alias for [`anyhow::Result<T>`](anyhow::Result) with [`String`] as default success type.
pub type Result<T = String> = anyhow::Result<T>;

pub use anyhow::Error;
