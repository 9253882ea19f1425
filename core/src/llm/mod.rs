//! # Text generation
//!
//! The generation gateway receives a fixed system instruction plus an ordered conversation and
//! answers with a lazy, single-pass stream of text chunks. Chunks arrive strictly in order; the
//! caller may stop polling at any time, which cancels the request. Output already received before
//! an error is kept by the caller.
//!
//! ```rust
//! use qadex_core::llm::{LanguageModel, Message};
//!
//! async fn greet(model: impl LanguageModel) -> qadex_core::Result {
//!     model
//!         .generate("You are a support bot.", &[Message::user("Introduce yourself.")])
//!         .await
//! }
//! ```

/// Message types and conversation handling.
pub mod message;

use alloc::{boxed::Box, string::String, sync::Arc};
use core::future::Future;
use futures_core::Stream;
use futures_lite::{StreamExt, pin};
pub use message::{Message, Role};

/// Language models for streaming text generation.
///
/// See the [module documentation](crate::llm) for the streaming contract.
pub trait LanguageModel: Sized + Send + Sync {
    /// The error type returned by this language model.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Streams the completion for `messages` under the `system` instruction.
    ///
    /// The stream is finite and cannot be restarted. Dropping it cancels generation.
    fn complete(
        &self,
        system: &str,
        messages: &[Message],
    ) -> impl Stream<Item = Result<String, Self::Error>> + Send;

    /// Collects the whole completion into one string.
    fn generate(
        &self,
        system: &str,
        messages: &[Message],
    ) -> impl Future<Output = crate::Result<String>> + Send {
        let stream = self.complete(system, messages);
        async move { Ok(try_collect(stream).await?) }
    }
}

macro_rules! impl_language_model {
    ($($name:ident),*) => {
        $(
            impl<T: LanguageModel> LanguageModel for $name<T> {
                type Error = T::Error;

                fn complete(
                    &self,
                    system: &str,
                    messages: &[Message],
                ) -> impl Stream<Item = Result<String, Self::Error>> + Send {
                    T::complete(self, system, messages)
                }

                fn generate(
                    &self,
                    system: &str,
                    messages: &[Message],
                ) -> impl Future<Output = crate::Result<String>> + Send {
                    T::generate(self, system, messages)
                }
            }
        )*
    };
}

impl<T: LanguageModel> LanguageModel for &T {
    type Error = T::Error;

    fn complete(
        &self,
        system: &str,
        messages: &[Message],
    ) -> impl Stream<Item = Result<String, Self::Error>> + Send {
        T::complete(self, system, messages)
    }

    fn generate(
        &self,
        system: &str,
        messages: &[Message],
    ) -> impl Future<Output = crate::Result<String>> + Send {
        T::generate(self, system, messages)
    }
}

impl_language_model!(Arc, Box);

pub(crate) async fn try_collect<S, Err>(stream: S) -> Result<String, Err>
where
    S: Stream<Item = Result<String, Err>>,
{
    pin!(stream);

    stream
        .try_fold(String::new(), |acc, chunk| Ok(acc + &chunk))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{string::ToString, vec, vec::Vec};
    use core::fmt;

    #[derive(Debug)]
    struct Unavailable;

    impl fmt::Display for Unavailable {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("generation unavailable")
        }
    }

    impl core::error::Error for Unavailable {}

    struct Echo {
        fail_after: Option<usize>,
    }

    impl LanguageModel for Echo {
        type Error = Unavailable;

        fn complete(
            &self,
            system: &str,
            messages: &[Message],
        ) -> impl Stream<Item = Result<String, Self::Error>> + Send {
            let mut chunks: Vec<Result<String, Unavailable>> = vec![Ok(system.to_string())];
            chunks.extend(messages.iter().map(|m| Ok(m.content().to_string())));
            if let Some(limit) = self.fail_after {
                chunks.truncate(limit);
                chunks.push(Err(Unavailable));
            }
            futures_lite::stream::iter(chunks)
        }
    }

    #[tokio::test]
    async fn generate_concatenates_chunks_in_order() {
        let model = Echo { fail_after: None };
        let text = model
            .generate("sys|", &[Message::user("a|"), Message::user("b")])
            .await
            .unwrap();
        assert_eq!(text, "sys|a|b");
    }

    #[tokio::test]
    async fn generate_surfaces_stream_errors() {
        let model = Echo {
            fail_after: Some(1),
        };
        let err = model
            .generate("sys", &[Message::user("a")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "generation unavailable");
    }

    #[tokio::test]
    async fn caller_can_stop_early() {
        let model = Arc::new(Echo { fail_after: None });
        let messages = [Message::user("first"), Message::user("second")];
        let stream = model.complete("sys", &messages);
        pin!(stream);
        assert_eq!(stream.next().await.unwrap().unwrap(), "sys");
        assert_eq!(stream.next().await.unwrap().unwrap(), "first");
    }
}
