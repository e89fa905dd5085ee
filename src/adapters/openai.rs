//! OpenAI-compatible chat completion client.
//!
//! Endpoint: POST {base_url}/chat/completions
//! Auth: Bearer token

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CompletionModel;
use crate::config::{require, ModelSettings};

/// Chat completion client
pub struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from resolved settings
    pub fn from_settings(settings: &ModelSettings) -> Result<Self> {
        Ok(Self::new(
            require(&settings.api_key, "OPENAI_API_KEY")?,
            settings.model.clone(),
            settings.base_url.clone(),
        ))
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Pull the first choice's text out of a response body
fn first_choice(response: ChatResponse) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .context("Completion response contained no choices")?;
    choice
        .message
        .content
        .context("Completion choice has no text content")
}

/// Human-readable message for a failed request
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait(?Send)]
impl CompletionModel for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.model, prompt_bytes = prompt.len(), "Sending completion request");

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to reach completion endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion error ({}): {}", status, error_message(&text));
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        first_choice(body)
    }
}
