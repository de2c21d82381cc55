use crate::traits::{QueryExpansion, VectorIndex};
use crate::{AnswerError, Document, SearchError};
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalPath {
    Direct,
    MultiQuery,
}

#[derive(Debug, Clone)]
pub struct Retrieval {
    pub documents: Vec<Document>,
    pub path: RetrievalPath,
}

/// Resolves a question into one context list.
///
/// Direct retrieval wins whenever it returns anything. Only a total miss falls
/// back to query expansion, whose merged results are deduplicated on the full
/// serialized document (content and metadata).
pub struct RetrievalOrchestrator<I, X> {
    index: I,
    expander: X,
}

impl<I, X> RetrievalOrchestrator<I, X>
where
    I: VectorIndex,
    X: QueryExpansion,
{
    pub fn new(index: I, expander: X) -> Self {
        Self { index, expander }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub async fn retrieve(&self, question: &str) -> Result<Retrieval, AnswerError> {
        let direct = self.index.nearest_neighbors(question).await?;
        if !direct.is_empty() {
            debug!(hits = direct.len(), "direct retrieval");
            return Ok(Retrieval {
                documents: direct,
                path: RetrievalPath::Direct,
            });
        }

        let queries = self.expander.expand(question).await?;
        let mut merged = Vec::new();
        for query in &queries {
            merged.extend(self.index.nearest_neighbors(query).await?);
        }

        let documents = dedup_documents(merged)?;
        info!(
            queries = queries.len(),
            hits = documents.len(),
            "direct retrieval was empty, used multi-query retrieval"
        );

        Ok(Retrieval {
            documents,
            path: RetrievalPath::MultiQuery,
        })
    }
}

/// Keeps the first occurrence of each distinct document. Callers should not
/// rely on the resulting order.
pub fn dedup_documents(documents: Vec<Document>) -> Result<Vec<Document>, SearchError> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(documents.len());

    for document in documents {
        if seen.insert(serde_json::to_string(&document)?) {
            unique.push(document);
        }
    }

    Ok(unique)
}
