use crate::error::OpenAIError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    pub(crate) fn into_text(self) -> Option<String> {
        let mut buffer = String::new();
        for choice in self.choices {
            if let Some(content) = choice.delta.content {
                buffer.push_str(&content.into_text());
            }
        }
        if buffer.is_empty() {
            None
        } else {
            Some(buffer)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: DeltaMessage,
}

#[derive(Debug, Deserialize, Default)]
struct DeltaMessage {
    #[serde(default)]
    content: Option<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Blocks(Vec<DeltaContent>),
    Text(String),
}

impl MessageContent {
    fn into_text(self) -> String {
        match self {
            Self::Blocks(parts) => parts.into_iter().map(DeltaContent::into_text).collect(),
            Self::Text(text) => text,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DeltaContent {
    Text { text: String },
    Inline(String),
}

impl DeltaContent {
    fn into_text(self) -> String {
        match self {
            Self::Text { text } | Self::Inline(text) => text,
        }
    }
}

/// What a single server-sent event carried.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// A non-empty piece of the answer.
    Text(String),
    /// Keep-alives, role-only deltas and other events without text.
    Skip,
    /// The `[DONE]` terminator.
    Done,
}

/// Interprets the `data` payload of one event.
pub(crate) fn parse_data(data: &str) -> Result<StreamEvent, OpenAIError> {
    let data = data.trim();
    if data.is_empty() || data.eq_ignore_ascii_case(": ping") {
        return Ok(StreamEvent::Skip);
    }
    if data == "[DONE]" {
        return Ok(StreamEvent::Done);
    }

    let value: serde_json::Value = serde_json::from_str(data)?;
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown streaming error");
        return Err(OpenAIError::Api(message.to_string()));
    }

    let chunk: ChatCompletionChunk = serde_json::from_value(value)?;
    Ok(chunk.into_text().map_or(StreamEvent::Skip, StreamEvent::Text))
}
