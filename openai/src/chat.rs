use crate::{
    client::{OpenAI, send_with_retry},
    error::OpenAIError,
    request::{ChatCompletionRequest, to_chat_messages},
    response::{StreamEvent, parse_data},
};
use eventsource_stream::Eventsource;
use futures_core::Stream;
use futures_lite::{StreamExt, pin};
use qadex_core::{LanguageModel, llm::Message};

impl LanguageModel for OpenAI {
    type Error = OpenAIError;

    fn complete(
        &self,
        system: &str,
        messages: &[Message],
    ) -> impl Stream<Item = Result<String, Self::Error>> + Send {
        let cfg = self.config();
        let system = system.to_owned();
        let messages = messages.to_vec();

        async_stream::try_stream! {
            let request = ChatCompletionRequest::streaming(
                &cfg.chat_model,
                to_chat_messages(&system, &messages),
            );
            let body = serde_json::to_vec(&request).map_err(OpenAIError::from)?;
            tracing::debug!(
                model = %cfg.chat_model,
                messages = messages.len(),
                "starting chat completion stream"
            );

            let response = send_with_retry(&cfg, || {
                cfg.post("/chat/completions")
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body.clone())
            })
            .await?;

            let answer = answer_chunks(response.bytes_stream());
            pin!(answer);
            while let Some(chunk) = answer.next().await {
                yield chunk?;
            }
        }
    }
}

/// Text carried by an event-stream body, up to the `[DONE]` terminator.
fn answer_chunks<S, B>(body: S) -> impl Stream<Item = Result<String, OpenAIError>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send,
    B: AsRef<[u8]> + Send,
{
    async_stream::try_stream! {
        let events = body.eventsource();
        pin!(events);
        while let Some(event) = events.next().await {
            let event = event.map_err(OpenAIError::from)?;
            match parse_data(&event.data)? {
                StreamEvent::Text(text) => yield text,
                StreamEvent::Skip => {}
                StreamEvent::Done => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(chunks: &[&'static str]) -> impl Stream<Item = Result<&'static [u8], reqwest::Error>> + Send {
        let chunks: Vec<Result<&'static [u8], reqwest::Error>> =
            chunks.iter().map(|&chunk| Ok(chunk.as_bytes())).collect();
        futures_lite::stream::iter(chunks)
    }

    async fn collect(chunks: &[&'static str]) -> Vec<Result<String, OpenAIError>> {
        let answer = answer_chunks(body(chunks));
        pin!(answer);
        let mut items = Vec::new();
        while let Some(item) = answer.next().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn events_split_across_chunks() {
        let items = collect(&[
            "data: {\"choices\":[{\"delta\":{\"con",
            "tent\":\"Hola\"}}]}\n\n",
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" mundo\"}}]}\r\n\r\n",
        ])
        .await;
        let text: Vec<String> = items.into_iter().map(Result::unwrap).collect();
        assert_eq!(text, vec!["Hola".to_string(), " mundo".to_string()]);
    }

    #[tokio::test]
    async fn done_ends_the_answer() {
        let items = collect(&[
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ])
        .await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), "ok");
    }

    #[tokio::test]
    async fn error_event_ends_the_answer() {
        let items = collect(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n\n",
            "data: {\"error\":{\"message\":\"overloaded\"}}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"tial\"}}]}\n\n",
        ])
        .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "par");
        assert!(matches!(&items[1], Err(OpenAIError::Api(message)) if message == "overloaded"));
    }
}
