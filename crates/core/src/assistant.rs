use crate::chunking::split_documents;
use crate::config::AssistantConfig;
use crate::embeddings::Embedder;
use crate::expansion::MultiQueryExpander;
use crate::index::{BuildOutcome, PersistentVectorIndex};
use crate::ingest::{load_documents, SkippedDocument};
use crate::llm::LanguageModel;
use crate::retrieval::RetrievalOrchestrator;
use crate::session::ChatSession;
use crate::synthesizer::AnswerSynthesizer;
use crate::traits::{QueryExpansion, VectorIndex};
use crate::transcript::TranscriptLog;
use crate::{Answer, AnswerError, PersistError, StartupError};
use std::sync::Arc;
use tracing::info;

/// What startup did to get the index ready.
pub struct StartupReport {
    pub outcome: BuildOutcome,
    pub indexed_chunks: usize,
    pub loaded_documents: usize,
    pub skipped_files: Vec<SkippedDocument>,
}

/// Everything a request handler needs, built once at startup.
pub struct Assistant<I, X, M> {
    synthesizer: AnswerSynthesizer<I, X, M>,
    transcript: TranscriptLog,
    memory_window_size: usize,
}

pub type IndexedAssistant<E, M> =
    Assistant<PersistentVectorIndex<E>, MultiQueryExpander<Arc<M>>, Arc<M>>;

impl<I, X, M> Assistant<I, X, M>
where
    I: VectorIndex,
    X: QueryExpansion,
    M: LanguageModel,
{
    pub fn new(
        synthesizer: AnswerSynthesizer<I, X, M>,
        transcript: TranscriptLog,
        memory_window_size: usize,
    ) -> Self {
        Self {
            synthesizer,
            transcript,
            memory_window_size,
        }
    }

    pub fn new_session(&self) -> ChatSession {
        ChatSession::new(self.memory_window_size)
    }

    pub async fn answer(
        &self,
        session: &mut ChatSession,
        question: &str,
    ) -> Result<Answer, AnswerError> {
        self.synthesizer.answer(session, question).await
    }

    pub fn record_conversation(
        &self,
        question: &str,
        bot_response: &str,
    ) -> Result<(), PersistError> {
        self.transcript.record_conversation(question, bot_response)
    }

    pub fn record_feedback(
        &self,
        feedback: &str,
        question: &str,
        bot_response: &str,
    ) -> Result<(), PersistError> {
        self.transcript.record_feedback(feedback, question, bot_response)
    }
}

impl<E, M> Assistant<PersistentVectorIndex<E>, MultiQueryExpander<Arc<M>>, Arc<M>>
where
    E: Embedder,
    M: LanguageModel,
{
    /// Validates `config`, then loads the persisted index or builds it from the
    /// document folder. Documents are not read when an index already exists.
    pub async fn bootstrap(
        config: &AssistantConfig,
        embedder: E,
        model: M,
    ) -> Result<(Self, StartupReport), StartupError> {
        config.validate()?;

        let path = &config.index_persist_path;
        let options = config.index_options();

        let (index, loaded_documents, skipped_files) = if PersistentVectorIndex::<E>::exists(path) {
            let index = PersistentVectorIndex::load(path, embedder, options).await?;
            (index, 0, Vec::new())
        } else {
            let report = load_documents(&config.document_folder)?;
            let chunks = split_documents(&report.documents, config.chunking())?;
            info!(
                documents = report.documents.len(),
                chunks = chunks.len(),
                "split documents into chunks"
            );
            let index = PersistentVectorIndex::build(path, &chunks, embedder, options).await?;
            (index, report.documents.len(), report.skipped_files)
        };

        let report = StartupReport {
            outcome: index.outcome(),
            indexed_chunks: index.len(),
            loaded_documents,
            skipped_files,
        };

        let model = Arc::new(model);
        let retriever = RetrievalOrchestrator::new(index, MultiQueryExpander::new(model.clone()));
        let synthesizer = AnswerSynthesizer::new(retriever, model, config.temperature);
        let assistant = Self::new(
            synthesizer,
            TranscriptLog::new(&config.log_folder),
            config.memory_window_size,
        );

        Ok((assistant, report))
    }
}
