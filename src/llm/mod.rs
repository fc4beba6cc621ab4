//! Chat-completion client used for answer generation.
//!
//! Generation is delegated to an Ollama runtime over HTTP. The trait keeps the pipeline
//! independent of the provider so tests can substitute a canned responder.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum LlmClientError {
    /// Provider was unreachable or the model is not installed.
    #[error("LLM provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate answer: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Prompt pair and sampling settings passed to the chat provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// System instruction.
    pub system: String,
    /// User message holding context and question.
    pub user: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Interface implemented by chat-completion providers.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Return the assistant message for the request, trimmed.
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmClientError>;
}

/// Build the chat client for the configured Ollama runtime.
pub fn get_chat_client(config: &Config) -> Result<Box<dyn ChatClient>, LlmClientError> {
    Ok(Box::new(OllamaChatClient::new(config.ollama_url.clone())?))
}

/// Non-streaming client for Ollama's `/api/chat` endpoint.
pub struct OllamaChatClient {
    http: Client,
    base_url: String,
}

impl OllamaChatClient {
    /// Create a client for the Ollama runtime at `base_url`.
    pub fn new(base_url: String) -> Result<Self, LlmClientError> {
        let http = Client::builder()
            .user_agent("budget-rag/chat")
            .build()
            .map_err(|error| LlmClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[async_trait]
impl ChatClient for OllamaChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmClientError> {
        let payload = json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user }
            ],
            "stream": false,
            "options": {
                "temperature": request.temperature,
            }
        });

        tracing::debug!(model = %request.model, "Requesting chat completion");
        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                LlmClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmClientError::ProviderUnavailable(format!(
                "model '{}' not available: {body}",
                request.model
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaChatResponse = response.json().await.map_err(|error| {
            LlmClientError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(LlmClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.message.content.trim().to_string())
    }
}
