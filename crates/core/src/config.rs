use crate::chunking::{ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::embeddings::DEFAULT_EMBEDDING_MODEL;
use crate::error::ConfigError;
use crate::index::{IndexOptions, DEFAULT_TOP_K};
use crate::llm::DEFAULT_CHAT_MODEL;
use crate::memory::DEFAULT_WINDOW_SIZE;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub document_folder: PathBuf,
    pub index_persist_path: PathBuf,
    pub log_folder: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub memory_window_size: usize,
    pub top_k: usize,
    pub api_key: String,
    pub api_base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub request_timeout_secs: u64,
    pub temperature: f32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            document_folder: PathBuf::from("./data/"),
            index_persist_path: PathBuf::from("./chroma_store"),
            log_folder: PathBuf::from("./data/"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            memory_window_size: DEFAULT_WINDOW_SIZE,
            top_k: DEFAULT_TOP_K,
            api_key: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            temperature: 0.0,
        }
    }
}

impl AssistantConfig {
    /// Must pass before any index is built or request served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("OPENAI_API_KEY"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "REQUEST_TIMEOUT_SECS",
                details: "timeout must be greater than zero".to_string(),
            });
        }
        if self.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                name: "RETRIEVAL_TOP_K",
                details: "top_k must be greater than zero".to_string(),
            });
        }
        self.chunking()
            .validate()
            .map_err(|error| ConfigError::InvalidValue {
                name: "CHUNK_SIZE/CHUNK_OVERLAP",
                details: error.to_string(),
            })?;
        self.provider_settings()?;
        Ok(())
    }

    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions { top_k: self.top_k }
    }

    pub fn provider_settings(&self) -> Result<ProviderSettings, ConfigError> {
        ProviderSettings::new(
            self.api_key.clone(),
            &self.api_base_url,
            Duration::from_secs(self.request_timeout_secs),
        )
    }
}

/// Connection settings shared by the embedding and chat clients.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: Url,
    pub timeout: Duration,
}

impl ProviderSettings {
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            api_key: api_key.into(),
            base_url: Url::parse(&base)?,
            timeout,
        })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }
}
