//! Completion service client.
//!
//! Answers are generated by a hosted model behind an OpenAI-compatible
//! chat-completions endpoint (OpenRouter by default). The controller talks
//! to the [`Completer`] trait; [`OpenRouterCompleter`] is the HTTP
//! implementation.
//!
//! ```text
//! POST {base_url}/chat/completions
//! Authorization: Bearer <OPENROUTER_API_KEY>
//! {"model": "...", "messages": [{"role": "system", ...}, {"role": "user", ...}]}
//!
//! 200 {"choices": [{"message": {"role": "assistant", "content": "..."}}]}
//! ```

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::CompletionConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionResponse {
    /// Content of the first choice.
    pub fn first_content(self) -> Result<String> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("completion response contained no choices"))?;
        choice
            .message
            .content
            .ok_or_else(|| anyhow!("completion response choice has no content"))
    }
}

#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

pub struct OpenRouterCompleter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenRouterCompleter {
    pub fn new(config: &CompletionConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build completion HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Completer for OpenRouterCompleter {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .context("completion service request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                model = %request.model,
                "completion service returned an error"
            );
            bail!("completion service error {}: {}", status, body_text);
        }

        resp.json()
            .await
            .context("Invalid completion response: malformed body")
    }
}
