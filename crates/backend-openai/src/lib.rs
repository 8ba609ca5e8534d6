//! OpenAI-compatible completion backend.
//!
//! Implements [`CompletionBackend`] over the `/chat/completions` HTTP API,
//! so any server speaking that protocol can drive assisted extraction.
//! Transient failures are retried with capped exponential back-off; the
//! engine still bounds the whole call with its own timeout.

mod retry;

use std::time::Duration;

use brandlens_extract::{CompletionBackend, CompletionError};
use serde::{Deserialize, Serialize};

use crate::retry::retry_with_backoff;

/// Completion backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Bearer token; omitted for local servers that need none
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Additional attempts after a transient failure
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            max_retries: 2,
            backoff_base_ms: 500,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions backend.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompletionError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn build_request<'a>(&'a self, system_instruction: &'a str, user_content: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            temperature: 0.0,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send_once(&self, body: &ChatRequest<'_>) -> Result<String, CompletionError> {
        let response = self
            .authorize(self.client.post(self.endpoint("chat/completions")))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(transport_error)?;
        parse_response(&text)
    }
}

fn transport_error(error: reqwest::Error) -> CompletionError {
    if error.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Connection(error.to_string())
    }
}

/// Content of the first choice of a chat-completions response body.
fn parse_response(body: &str) -> Result<String, CompletionError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Parse(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::Parse("Missing choices".to_string()))?
        .message
        .content
        .ok_or_else(|| CompletionError::Parse("Missing message content".to_string()))
}

impl CompletionBackend for OpenAiBackend {
    async fn complete(
        &self,
        system_instruction: &str,
        user_content: &str,
    ) -> Result<String, CompletionError> {
        let body = self.build_request(system_instruction, user_content);

        tracing::debug!(
            model = %self.config.model,
            chars = user_content.len(),
            "Requesting completion"
        );

        retry_with_backoff(self.config.max_retries, self.config.backoff_base_ms, || {
            self.send_once(&body)
        })
        .await
    }

    async fn health_check(&self) -> Result<(), CompletionError> {
        let response = self
            .authorize(self.client.get(self.endpoint("models")))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(CompletionError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
