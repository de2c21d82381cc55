use crate::{Document, ModelError, SearchError};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Most similar documents first. Empty when nothing is indexed or nothing matches.
    async fn nearest_neighbors(&self, query: &str) -> Result<Vec<Document>, SearchError>;
}

#[async_trait]
pub trait QueryExpansion: Send + Sync {
    /// Alternate phrasings of `question`, used to widen recall.
    async fn expand(&self, question: &str) -> Result<Vec<String>, ModelError>;
}
