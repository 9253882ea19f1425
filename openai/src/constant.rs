//! Model & endpoint constants.
//!
//! Users can always pass custom strings for other models or OpenAI-compatible servers.

/// Default `OpenAI` API base URL (chat, embeddings, etc.).
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Cheapest small multimodal model, great for support bots.
pub const GPT4O_MINI: &str = "gpt-4o-mini";

/// Small + inexpensive embedding model (1536-dim).
pub const EMBEDDING_SMALL: &str = "text-embedding-3-small";

/// High-accuracy embedding model (3072-dim).
pub const EMBEDDING_LARGE: &str = "text-embedding-3-large";
