use crate::llm::LanguageModel;
use crate::prompt::render_answer_prompt;
use crate::retrieval::RetrievalOrchestrator;
use crate::session::ChatSession;
use crate::traits::{QueryExpansion, VectorIndex};
use crate::{Answer, AnswerError, Document};
use tracing::debug;

/// Turns a question into an answer plus the sources it was grounded on.
pub struct AnswerSynthesizer<I, X, M> {
    retriever: RetrievalOrchestrator<I, X>,
    model: M,
    temperature: f32,
}

impl<I, X, M> AnswerSynthesizer<I, X, M>
where
    I: VectorIndex,
    X: QueryExpansion,
    M: LanguageModel,
{
    pub fn new(retriever: RetrievalOrchestrator<I, X>, model: M, temperature: f32) -> Self {
        Self {
            retriever,
            model,
            temperature,
        }
    }

    /// The session's memory is only updated after the model has answered, so a
    /// failed call leaves the conversation untouched.
    pub async fn answer(
        &self,
        session: &mut ChatSession,
        question: &str,
    ) -> Result<Answer, AnswerError> {
        let retrieval = self.retriever.retrieve(question).await?;
        let context = join_context(&retrieval.documents);
        let history = session.memory.load();

        let prompt = render_answer_prompt(&context, &history, question);
        debug!(
            session = %session.id,
            path = ?retrieval.path,
            context_docs = retrieval.documents.len(),
            "synthesizing answer"
        );
        let text = self.model.complete(&prompt, self.temperature).await?;

        session.memory.save(question, text.clone());

        let sources = retrieval
            .documents
            .iter()
            .map(|document| document.source().to_string())
            .collect();

        Ok(Answer { text, sources })
    }
}

/// Document bodies in received order, separated by a blank line.
pub fn join_context(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|document| document.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
