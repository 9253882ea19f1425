//! Timeouts around embedding and generation calls.

use std::future::Future;
use std::time::Duration;

use futures_core::Stream;
use futures_lite::StreamExt;
use qadex_core::EmbeddingModel;
use qadex_core::embedding::Embedding;

use crate::error::{Gateway, RagError, Result};

/// Awaits `future`, failing with [`RagError::Timeout`] once `timeout` elapses.
pub(crate) async fn with_timeout<T>(
    gateway: Gateway,
    timeout: Option<Duration>,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    let Some(limit) = timeout else {
        return future.await;
    };
    futures_lite::future::or(future, async move {
        async_io::Timer::after(limit).await;
        Err(RagError::Timeout {
            gateway,
            timeout: limit,
        })
    })
    .await
}

/// Embeds `text`, mapping failures to [`RagError::Embedding`] and checking the length.
pub(crate) async fn embed<M: EmbeddingModel>(
    model: &M,
    text: &str,
    timeout: Option<Duration>,
) -> Result<Embedding> {
    let embedding = with_timeout(Gateway::Embedding, timeout, async {
        model.embed(text).await.map_err(RagError::Embedding)
    })
    .await?;

    if embedding.len() == model.dim() {
        Ok(embedding)
    } else {
        Err(RagError::DimensionMismatch {
            expected: model.dim(),
            actual: embedding.len(),
        })
    }
}

/// Next item of a generation stream, with the timeout applied per chunk.
pub(crate) async fn next_chunk<S, E>(stream: &mut S, timeout: Option<Duration>) -> Option<Result<String>>
where
    S: Stream<Item = std::result::Result<String, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let next = with_timeout(Gateway::Generation, timeout, async {
        Ok(stream.next().await)
    })
    .await;

    match next {
        Ok(Some(Ok(chunk))) => Some(Ok(chunk)),
        Ok(Some(Err(e))) => Some(Err(RagError::Generation(anyhow::Error::new(e)))),
        Ok(None) => None,
        Err(e) => Some(Err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    struct Slow;

    impl EmbeddingModel for Slow {
        fn dim(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> qadex_core::Result<Vec<f32>> {
            async_io::Timer::after(Duration::from_secs(5)).await;
            Ok(vec![0.0, 1.0])
        }
    }

    struct Short;

    impl EmbeddingModel for Short {
        fn dim(&self) -> usize {
            3
        }

        async fn embed(&self, _text: &str) -> qadex_core::Result<Vec<f32>> {
            Ok(vec![1.0])
        }
    }

    #[tokio::test]
    async fn slow_embedding_times_out() {
        let err = embed(&Slow, "hello", Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RagError::Timeout {
                gateway: Gateway::Embedding,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::GatewayUnavailable);
    }

    #[tokio::test]
    async fn wrong_length_is_rejected() {
        assert!(matches!(
            embed(&Short, "hello", None).await,
            Err(RagError::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[tokio::test]
    async fn stream_errors_are_generation_errors() {
        let mut stream = futures_lite::stream::iter(vec![
            Ok("a".to_string()),
            Err(std::io::Error::other("reset")),
        ]);

        assert_eq!(next_chunk(&mut stream, None).await.unwrap().unwrap(), "a");
        assert!(matches!(
            next_chunk(&mut stream, None).await,
            Some(Err(RagError::Generation(_)))
        ));
        assert!(next_chunk(&mut stream, None).await.is_none());
    }
}
