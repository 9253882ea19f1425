//! Turns a [`RetrievalContext`] into the user message sent to the language model.

use crate::retriever::RetrievalContext;

/// Labels of the generation prompt.
///
/// The rendered prompt is a header line, then one block per retrieved pair
/// (question line, answer label line, indented answer, blank line) and finally
/// the instruction line carrying the user's question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    /// First line of the prompt.
    pub header: String,
    /// Prefix of each retrieved question.
    pub question_label: String,
    /// Line preceding each retrieved answer.
    pub answer_label: String,
    /// Prefix of the final line holding the user's question.
    pub instruction_label: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            header: "Given the following questions and answers:".into(),
            question_label: "Question:".into(),
            answer_label: "Answer:".into(),
            instruction_label: "Answer the following question:".into(),
        }
    }
}

impl PromptTemplate {
    /// The labels used with the Spanish dataset.
    #[must_use]
    pub fn spanish() -> Self {
        Self {
            header: "Con las siguientes preguntas y respuestas:".into(),
            question_label: "Pregunta:".into(),
            answer_label: "Respuesta:".into(),
            instruction_label: "Responde la siguiente pregunta:".into(),
        }
    }

    /// Renders the prompt for `query` over `context`.
    #[must_use]
    pub fn render(&self, context: &RetrievalContext, query: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(&self.header);
        prompt.push('\n');
        for (question, answer) in context.pairs() {
            prompt.push_str(&format!(
                "{} {question}\n{}\n {answer}\n\n",
                self.question_label, self.answer_label
            ));
        }
        prompt.push_str(&format!("{} {query}\n", self.instruction_label));
        prompt
    }
}
