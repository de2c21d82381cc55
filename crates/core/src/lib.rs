pub mod assistant;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod expansion;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod memory;
pub mod models;
pub mod prompt;
pub mod retrieval;
pub mod session;
pub mod synthesizer;
pub mod traits;
pub mod transcript;

pub use assistant::{Assistant, IndexedAssistant, StartupReport};
pub use chunking::{split_documents, split_text, ChunkingConfig};
pub use config::{AssistantConfig, ProviderSettings};
pub use embeddings::{CharacterNgramEmbedder, Embedder, OpenAiEmbedder};
pub use error::{
    AnswerError, ConfigError, IngestError, ModelError, PersistError, SearchError, StartupError,
};
pub use expansion::MultiQueryExpander;
pub use extractor::{extract_document_text, DocumentExtractor, DocxExtractor, PdfTextExtractor};
pub use index::{BuildOutcome, IndexManifest, IndexOptions, PersistentVectorIndex};
pub use ingest::{discover_documents, load_documents, IngestionReport, SkippedDocument};
pub use llm::{LanguageModel, OpenAiChatModel};
pub use memory::ConversationMemory;
pub use models::{Answer, ConversationTurn, Document, DocumentMetadata, IndexedChunk};
pub use retrieval::{Retrieval, RetrievalOrchestrator, RetrievalPath};
pub use session::ChatSession;
pub use synthesizer::AnswerSynthesizer;
pub use traits::{QueryExpansion, VectorIndex};
pub use transcript::TranscriptLog;
