//! Chat-completion client used for answer synthesis and query expansion.

use crate::config::ProviderSettings;
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

const PROVIDER: &str = "openai";

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends `prompt` as a single user message and returns the reply text.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ModelError>;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ModelError> {
        (**self).complete(prompt, temperature).await
    }
}

pub struct OpenAiChatModel {
    client: Client,
    settings: ProviderSettings,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(settings: ProviderSettings, model: impl Into<String>) -> Result<Self, ModelError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            settings,
            model: model.into(),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, ModelError> {
        debug!(model = %self.model, prompt_len = prompt.len(), temperature, "chat completion");

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
        };

        let response = self
            .client
            .post(self.settings.endpoint("chat/completions")?)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| transport_error(error, &self.settings))?;

        let response = ensure_success(response).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|error| transport_error(error, &self.settings))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::EmptyResponse {
                provider: PROVIDER.to_string(),
            })
    }
}

/// Client timeouts cover the whole exchange, so a stall while reading the body
/// is reported the same way as a stall before the headers.
pub(crate) fn transport_error(error: reqwest::Error, settings: &ProviderSettings) -> ModelError {
    if error.is_timeout() {
        error!(provider = PROVIDER, seconds = settings.timeout.as_secs(), "request timed out");
        ModelError::Timeout {
            provider: PROVIDER.to_string(),
            seconds: settings.timeout.as_secs(),
        }
    } else {
        error!(provider = PROVIDER, error = %error, "request failed");
        ModelError::Http(error)
    }
}

pub(crate) async fn ensure_success(response: Response) -> Result<Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!(provider = PROVIDER, %status, "provider error");
    Err(ModelError::Provider {
        provider: PROVIDER.to_string(),
        status: status.as_u16(),
        message: provider_message(&body),
    })
}

fn provider_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.to_string())
}
