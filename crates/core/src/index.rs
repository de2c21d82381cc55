use crate::embeddings::Embedder;
use crate::traits::VectorIndex;
use crate::{Document, IndexedChunk, SearchError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_TOP_K: usize = 4;

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    pub top_k: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// An index already persisted at the location was reused.
    Loaded,
    /// Chunks were embedded and written out.
    Built,
    /// No chunks were given and nothing was persisted.
    Empty,
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    manifest: IndexManifest,
    chunks: Vec<IndexedChunk>,
}

/// Flat cosine-similarity index kept in memory and persisted as JSON.
/// Read-only once built.
pub struct PersistentVectorIndex<E> {
    embedder: E,
    options: IndexOptions,
    manifest: IndexManifest,
    chunks: Vec<IndexedChunk>,
    outcome: BuildOutcome,
}

impl<E: Embedder> PersistentVectorIndex<E> {
    pub fn index_file(path: &Path) -> PathBuf {
        path.join(INDEX_FILE)
    }

    pub fn exists(path: &Path) -> bool {
        Self::index_file(path).is_file()
    }

    /// Loads the index persisted under `path` if there is one, otherwise embeds
    /// `chunks` and persists them. Never re-embeds an existing index.
    pub async fn build(
        path: &Path,
        chunks: &[Document],
        embedder: E,
        options: IndexOptions,
    ) -> Result<Self, SearchError> {
        if Self::exists(path) {
            return Self::load(path, embedder, options).await;
        }

        if chunks.is_empty() {
            warn!(
                path = %path.display(),
                "no chunks to index; index stays empty and is not persisted"
            );
            return Ok(Self {
                manifest: IndexManifest {
                    embedding_model: embedder.model_name().to_string(),
                    dimensions: 0,
                    chunk_count: 0,
                    created_at: Utc::now(),
                },
                embedder,
                options,
                chunks: Vec::new(),
                outcome: BuildOutcome::Empty,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(SearchError::NotReady(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();
        if let Some(bad) = embeddings.iter().find(|vector| vector.len() != dimensions) {
            return Err(SearchError::DimensionMismatch {
                expected: dimensions,
                actual: bad.len(),
            });
        }

        let indexed: Vec<IndexedChunk> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunk {
                chunk_id: make_chunk_id(chunk),
                document: chunk.clone(),
                embedding,
            })
            .collect();

        let persisted = PersistedIndex {
            manifest: IndexManifest {
                embedding_model: embedder.model_name().to_string(),
                dimensions,
                chunk_count: indexed.len(),
                created_at: Utc::now(),
            },
            chunks: indexed,
        };
        persist(path, &persisted).await?;
        info!(
            path = %path.display(),
            chunk_count = persisted.chunks.len(),
            dimensions,
            "vector index built"
        );

        Ok(Self {
            embedder,
            options,
            manifest: persisted.manifest,
            chunks: persisted.chunks,
            outcome: BuildOutcome::Built,
        })
    }

    pub async fn load(
        path: &Path,
        embedder: E,
        options: IndexOptions,
    ) -> Result<Self, SearchError> {
        let file = Self::index_file(path);
        if !file.is_file() {
            return Err(SearchError::NotReady(format!(
                "no persisted index at {}",
                file.display()
            )));
        }

        let bytes = tokio::fs::read(&file).await?;
        let persisted: PersistedIndex = serde_json::from_slice(&bytes)?;

        if persisted.manifest.embedding_model != embedder.model_name() {
            warn!(
                persisted = %persisted.manifest.embedding_model,
                configured = %embedder.model_name(),
                "persisted index was built with a different embedding model"
            );
        }
        info!(
            path = %path.display(),
            chunk_count = persisted.chunks.len(),
            "vector index loaded"
        );

        Ok(Self {
            embedder,
            options,
            manifest: persisted.manifest,
            chunks: persisted.chunks,
            outcome: BuildOutcome::Loaded,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn outcome(&self) -> BuildOutcome {
        self.outcome
    }
}

#[async_trait]
impl<E: Embedder> VectorIndex for PersistentVectorIndex<E> {
    async fn nearest_neighbors(&self, query: &str) -> Result<Vec<Document>, SearchError> {
        if self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        if query_vector.len() != self.manifest.dimensions {
            return Err(SearchError::DimensionMismatch {
                expected: self.manifest.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .chunks
            .iter()
            .map(|chunk| (cosine_similarity(&query_vector, &chunk.embedding), chunk))
            .collect();

        scored.sort_by(|left, right| right.0.total_cmp(&left.0));
        scored.truncate(self.options.top_k);
        debug!(hits = scored.len(), "nearest neighbors");

        Ok(scored
            .into_iter()
            .map(|(_, chunk)| chunk.document.clone())
            .collect())
    }
}

async fn persist(path: &Path, index: &PersistedIndex) -> Result<(), SearchError> {
    tokio::fs::create_dir_all(path).await?;
    let target = path.join(INDEX_FILE);
    let staging = path.join(format!("{INDEX_FILE}.tmp"));

    let bytes = serde_json::to_vec(index)?;
    tokio::fs::write(&staging, bytes).await?;
    tokio::fs::rename(&staging, &target).await?;
    Ok(())
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let norm_left = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let norm_right = right.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm_left == 0.0 || norm_right == 0.0 {
        return 0.0;
    }
    dot / (norm_left * norm_right)
}

fn make_chunk_id(chunk: &Document) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk.metadata.source.as_bytes());
    hasher.update(chunk.metadata.start_index.unwrap_or_default().to_le_bytes());
    hasher.update(chunk.content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::ModelError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct CountingEmbedder {
        inner: CharacterNgramEmbedder,
        embedded: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting-trigram"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
            self.embedded.fetch_add(1, Ordering::SeqCst);
            Ok(self.inner.embed_sync(text))
        }
    }

    fn corpus() -> Vec<Document> {
        let mut rates = Document::new(
            "A floating rate swap exchanges floating rate payments for fixed rate payments.",
            "rates.docx",
        );
        rates.metadata.start_index = Some(0);
        let mut options = Document::new(
            "A call option gives the holder the right to buy the underlying asset.",
            "options.docx",
        );
        options.metadata.start_index = Some(0);
        vec![rates, options]
    }

    #[tokio::test]
    async fn second_build_loads_instead_of_reembedding(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let embedder = CountingEmbedder::default();
        let counter = embedder.embedded.clone();

        let first = PersistentVectorIndex::build(
            dir.path(),
            &corpus(),
            embedder.clone(),
            IndexOptions::default(),
        )
        .await?;
        assert_eq!(first.outcome(), BuildOutcome::Built);
        assert_eq!(first.len(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        let second =
            PersistentVectorIndex::build(dir.path(), &corpus(), embedder, IndexOptions::default())
                .await?;
        assert_eq!(second.outcome(), BuildOutcome::Loaded);
        assert_eq!(second.len(), 2);
        assert_eq!(second.manifest().chunk_count, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn most_similar_chunk_ranks_first() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let index = PersistentVectorIndex::build(
            dir.path(),
            &corpus(),
            CharacterNgramEmbedder::default(),
            IndexOptions::default(),
        )
        .await?;

        let hits = index.nearest_neighbors("What is a floating rate swap?").await?;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source(), "rates.docx");
        Ok(())
    }

    #[tokio::test]
    async fn top_k_limits_hits() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let options = IndexOptions { top_k: 1 };
        let index = PersistentVectorIndex::build(
            dir.path(),
            &corpus(),
            CharacterNgramEmbedder::default(),
            options,
        )
        .await?;

        assert_eq!(index.nearest_neighbors("call option").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn empty_index_returns_nothing_without_embedding(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let embedder = CountingEmbedder::default();
        let counter = embedder.embedded.clone();

        let index =
            PersistentVectorIndex::build(dir.path(), &[], embedder, IndexOptions::default()).await?;
        assert_eq!(index.outcome(), BuildOutcome::Empty);
        assert!(index.nearest_neighbors("anything").await?.is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!PersistentVectorIndex::<CountingEmbedder>::exists(dir.path()));
        Ok(())
    }

    #[tokio::test]
    async fn loading_a_missing_index_is_not_ready() {
        let dir = tempdir().unwrap();
        let result = PersistentVectorIndex::load(
            dir.path(),
            CharacterNgramEmbedder::default(),
            IndexOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(SearchError::NotReady(_))));
    }

    #[tokio::test]
    async fn query_dimension_mismatch_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        PersistentVectorIndex::build(
            dir.path(),
            &corpus(),
            CharacterNgramEmbedder { dimensions: 64 },
            IndexOptions::default(),
        )
        .await?;

        let reloaded = PersistentVectorIndex::load(
            dir.path(),
            CharacterNgramEmbedder { dimensions: 32 },
            IndexOptions::default(),
        )
        .await?;
        let result = reloaded.nearest_neighbors("swap").await;
        assert!(matches!(
            result,
            Err(SearchError::DimensionMismatch {
                expected: 64,
                actual: 32
            })
        ));
        Ok(())
    }
}
