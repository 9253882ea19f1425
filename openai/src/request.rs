use qadex_core::llm::{Message, Role};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessagePayload<'a>>,
    stream: bool,
}

impl<'a> ChatCompletionRequest<'a> {
    pub(crate) fn streaming(model: &'a str, messages: Vec<ChatMessagePayload<'a>>) -> Self {
        Self {
            model,
            messages,
            stream: true,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ChatMessagePayload<'a> {
    role: &'static str,
    content: &'a str,
}

/// Builds the wire conversation: the system instruction leads, followed by `messages` in order.
/// An empty instruction is left out.
pub(crate) fn to_chat_messages<'a>(
    system: &'a str,
    messages: &'a [Message],
) -> Vec<ChatMessagePayload<'a>> {
    let mut payload = Vec::with_capacity(messages.len() + 1);
    if !system.is_empty() {
        payload.push(ChatMessagePayload {
            role: Role::System.as_str(),
            content: system,
        });
    }
    payload.extend(messages.iter().map(|message| ChatMessagePayload {
        role: message.role().as_str(),
        content: message.content(),
    }));
    payload
}
