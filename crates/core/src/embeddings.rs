use crate::config::ProviderSettings;
use crate::error::ModelError;
use crate::llm::{ensure_success, transport_error};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Inputs per embeddings request.
const BATCH_SIZE: usize = 64;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        (**self).embed_batch(texts).await
    }
}

/// Hashed character-trigram embedder. Deterministic and offline.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        "character-trigram"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        Ok(self.embed_sync(text))
    }
}

pub struct OpenAiEmbedder {
    client: Client,
    settings: ProviderSettings,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(settings: ProviderSettings, model: impl Into<String>) -> Result<Self, ModelError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            settings,
            model: model.into(),
        })
    }

    async fn request(&self, input: &[&str]) -> Result<Vec<Vec<f32>>, ModelError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input,
        };

        let response = self
            .client
            .post(self.settings.endpoint("embeddings")?)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| transport_error(error, &self.settings))?;

        let response = ensure_success(response).await?;
        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|error| transport_error(error, &self.settings))?;
        parsed.data.sort_by_key(|item| item.index);

        if parsed.data.len() != input.len() {
            return Err(ModelError::EmptyResponse {
                provider: "openai".to_string(),
            });
        }

        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let mut vectors = self.request(&[text]).await?;
        vectors.pop().ok_or_else(|| ModelError::EmptyResponse {
            provider: "openai".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            debug!(model = %self.model, batch_size = batch.len(), "embedding batch");
            let input: Vec<&str> = batch.iter().map(String::as_str).collect();
            vectors.extend(self.request(&input).await?);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    fn settings_for(server: &MockServer) -> ProviderSettings {
        let base_url = format!("{}/v1", server.uri());
        ProviderSettings::new("sk-test", &base_url, Duration::from_secs(1)).unwrap()
    }

    /// Answers every input with a one-element vector holding its position in
    /// the batch, listed in reverse order.
    struct EchoEmbeddings;

    impl Respond for EchoEmbeddings {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            let count = body["input"].as_array().map(Vec::len).unwrap_or_default();
            let data: Vec<Value> = (0..count)
                .rev()
                .map(|index| json!({"index": index, "embedding": [index as f32]}))
                .collect();
            ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
        }
    }

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed_sync("Floating rate swap");
        let second = embedder.embed_sync("Floating rate swap");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vector = embedder.embed_sync("abc");
        assert_eq!(vector.len(), 32);
    }

    #[tokio::test]
    async fn default_batch_embeds_each_text() {
        let embedder = CharacterNgramEmbedder { dimensions: 16 };
        let texts = vec!["cap".to_string(), "floor".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], embedder.embed_sync("floor"));
    }

    #[test]
    fn embedding_response_is_reordered_by_index() {
        let mut parsed: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"index":1,"embedding":[2.0]},{"index":0,"embedding":[1.0]}]}"#,
        )
        .unwrap();
        parsed.data.sort_by_key(|item| item.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0]);
    }

    #[tokio::test]
    async fn batches_are_split_and_reordered() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(EchoEmbeddings)
            .expect(2)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(settings_for(&server), DEFAULT_EMBEDDING_MODEL).unwrap();
        let texts: Vec<String> = (0..BATCH_SIZE + 1).map(|n| format!("chunk {n}")).collect();
        let vectors = embedder.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), BATCH_SIZE + 1);
        assert_eq!(vectors[0], vec![0.0]);
        assert_eq!(vectors[5], vec![5.0]);
        assert_eq!(vectors[BATCH_SIZE], vec![0.0]);
    }

    #[tokio::test]
    async fn short_response_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [0.1, 0.2]}]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(settings_for(&server), DEFAULT_EMBEDDING_MODEL).unwrap();
        let texts = vec!["cap".to_string(), "floor".to_string()];
        assert!(matches!(
            embedder.embed_batch(&texts).await,
            Err(ModelError::EmptyResponse { .. })
        ));
    }

    #[tokio::test]
    async fn provider_failure_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(settings_for(&server), DEFAULT_EMBEDDING_MODEL).unwrap();
        match embedder.embed("swap").await {
            Err(ModelError::Provider {
                status, message, ..
            }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "rate limited");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_embedding_call_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(EchoEmbeddingsAfter(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(settings_for(&server), DEFAULT_EMBEDDING_MODEL).unwrap();
        assert!(matches!(
            embedder.embed("swap").await,
            Err(ModelError::Timeout { seconds: 1, .. })
        ));
    }

    struct EchoEmbeddingsAfter(Duration);

    impl Respond for EchoEmbeddingsAfter {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            EchoEmbeddings.respond(request).set_delay(self.0)
        }
    }
}
