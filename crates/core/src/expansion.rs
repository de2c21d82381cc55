use crate::llm::LanguageModel;
use crate::prompt::render_expansion_prompt;
use crate::traits::QueryExpansion;
use crate::ModelError;
use async_trait::async_trait;
use tracing::debug;

/// Number of paraphrases the expansion prompt asks for.
pub const EXPANSION_COUNT: usize = 5;

/// Asks the language model for alternate phrasings of a question.
/// Always samples at temperature 0.
pub struct MultiQueryExpander<M> {
    model: M,
}

impl<M: LanguageModel> MultiQueryExpander<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

#[async_trait]
impl<M: LanguageModel> QueryExpansion for MultiQueryExpander<M> {
    async fn expand(&self, question: &str) -> Result<Vec<String>, ModelError> {
        let prompt = render_expansion_prompt(question);
        let reply = self.model.complete(&prompt, 0.0).await?;
        let queries = split_queries(&reply);

        if queries.len() != EXPANSION_COUNT {
            debug!(
                expected = EXPANSION_COUNT,
                actual = queries.len(),
                "expansion returned an unexpected number of queries"
            );
        }
        Ok(queries)
    }
}

/// One query per line. Blank lines are dropped; other lines pass through
/// untouched, numbering included.
pub fn split_queries(reply: &str) -> Vec<String> {
    reply
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
