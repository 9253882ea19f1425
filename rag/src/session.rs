//! Question answering over retrieved context.

use std::time::Duration;

use futures_core::Stream;
use futures_lite::{StreamExt, pin};
use qadex_core::{EmbeddingModel, LanguageModel, llm::Message};

use crate::error::Result;
use crate::gateway;
use crate::index::VectorIndex;
use crate::prompt::PromptTemplate;
use crate::records::RecordStore;
use crate::retriever::{RetrievalContext, Retriever};

/// System instruction used unless another one is configured.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a technical support bot. Answer only with \
     the information provided in your context. For anything you cannot answer, give the \
     customer the contact information of the support team.";

/// Spanish counterpart of [`DEFAULT_SYSTEM_INSTRUCTION`].
pub const SPANISH_SYSTEM_INSTRUCTION: &str = "Eres un bot de soporte técnico que responde solo \
     con la información que se mande en tu contexto. Para cualquier duda que no puedas resolver, \
     dale al cliente la información de contacto del equipo de soporte.";

/// Prompt asking the model to introduce itself.
pub const DEFAULT_GREETING: &str = "Introduce yourself to the customer as the technical support assistant.";

/// Spanish counterpart of [`DEFAULT_GREETING`].
pub const SPANISH_GREETING: &str = "Preséntate ante el cliente como el asistente de soporte técnico.";

/// Context and rendered prompt for one question.
#[derive(Debug, Clone)]
pub struct PreparedQuestion {
    /// Records retrieved for the question.
    pub context: RetrievalContext,
    /// User message sent to the model.
    pub prompt: String,
}

/// A support conversation: retrieves context for each question and streams the
/// model's answer.
///
/// Dropping an answer stream cancels generation; the index is never touched.
#[derive(Debug)]
pub struct SupportSession<M, I, S, L> {
    retriever: Retriever<M, I, S>,
    model: L,
    system_instruction: String,
    template: PromptTemplate,
    gateway_timeout: Option<Duration>,
}

impl<M, I, S, L> SupportSession<M, I, S, L>
where
    M: EmbeddingModel,
    I: VectorIndex,
    S: RecordStore,
    L: LanguageModel,
{
    /// Creates a session with the English instruction and template.
    #[must_use]
    pub fn new(retriever: Retriever<M, I, S>, model: L) -> Self {
        Self {
            retriever,
            model,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_owned(),
            template: PromptTemplate::default(),
            gateway_timeout: None,
        }
    }

    /// Replaces the system instruction.
    #[must_use]
    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    /// Replaces the prompt template.
    #[must_use]
    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Limits the wait for each generated chunk to `timeout`.
    #[must_use]
    pub const fn gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = Some(timeout);
        self
    }

    /// Returns the retriever.
    pub const fn retriever(&self) -> &Retriever<M, I, S> {
        &self.retriever
    }

    /// Streams the model's reply to `instruction`, typically a self-introduction.
    pub fn greet<'a>(&'a self, instruction: &'a str) -> impl Stream<Item = Result<String>> + 'a {
        self.generate(vec![Message::user(instruction)])
    }

    /// Retrieves context for `question` and renders the prompt.
    ///
    /// # Errors
    ///
    /// Any error of [`Retriever::query`].
    pub async fn prepare(&self, question: &str) -> Result<PreparedQuestion> {
        let context = self.retriever.query(question).await?;
        let prompt = self.template.render(&context, question);
        Ok(PreparedQuestion { context, prompt })
    }

    /// Streams the answer to `question`.
    ///
    /// A retrieval failure is yielded as the only item. A generation failure ends the
    /// stream after the chunks already produced.
    pub fn ask<'a>(&'a self, question: &'a str) -> impl Stream<Item = Result<String>> + 'a {
        async_stream::try_stream! {
            let prepared = self.prepare(question).await?;
            let answer = self.generate(vec![Message::user(prepared.prompt)]);
            pin!(answer);
            while let Some(chunk) = answer.next().await {
                yield chunk?;
            }
        }
    }

    /// Collects the whole answer to `question`.
    ///
    /// # Errors
    ///
    /// Returns the first retrieval or generation error.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let stream = self.ask(question);
        pin!(stream);
        let mut answer = String::new();
        while let Some(chunk) = stream.next().await {
            answer.push_str(&chunk?);
        }
        Ok(answer)
    }

    fn generate(&self, messages: Vec<Message>) -> impl Stream<Item = Result<String>> + '_ {
        async_stream::try_stream! {
            let stream = self.model.complete(&self.system_instruction, &messages);
            pin!(stream);
            while let Some(chunk) = gateway::next_chunk(&mut stream, self.gateway_timeout).await {
                yield chunk?;
            }
        }
    }
}
