//! Chat session controller.
//!
//! Drives one question through retrieval and completion and records the
//! exchange in the session transcript:
//!
//! ```text
//! idle ──▶ awaiting retrieval ──▶ awaiting completion ──▶ idle
//!   │            │ error                 │ error
//!   ▼            ▼                       ▼
//! (blank: no-op) user turn kept, no assistant turn
//! ```
//!
//! The controller holds no per-session state. Every call gets the session
//! it should mutate.

use anyhow::Result;
use std::sync::Arc;

use crate::completion::{ChatMessage, Completer, CompletionRequest, OpenRouterCompleter};
use crate::config::{Config, Secrets};
use crate::models::{RetrievedNode, Turn};
use crate::prompt::{self, Variant};
use crate::retrieval::{LlamaCloudRetriever, Retriever};
use crate::session::ChatSession;

/// What a completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    /// Passages to show under the answer. Empty unless the variant shows sources.
    pub sources: Vec<RetrievedNode>,
}

#[derive(Clone)]
pub struct ChatController {
    retriever: Arc<dyn Retriever>,
    completer: Arc<dyn Completer>,
    pipeline_id: String,
    model: String,
    variant: Variant,
}

impl ChatController {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        completer: Arc<dyn Completer>,
        pipeline_id: impl Into<String>,
        model: impl Into<String>,
        variant: Variant,
    ) -> Self {
        Self {
            retriever,
            completer,
            pipeline_id: pipeline_id.into(),
            model: model.into(),
            variant,
        }
    }

    /// Controller wired to the hosted LlamaCloud and OpenRouter services.
    pub fn from_config(config: &Config, secrets: &Secrets) -> Result<Self> {
        let retriever = LlamaCloudRetriever::new(&config.retrieval, &secrets.retrieval_api_key)?;
        let completer =
            OpenRouterCompleter::new(&config.completion, &secrets.completion_api_key)?;
        Ok(Self::new(
            Arc::new(retriever),
            Arc::new(completer),
            &secrets.pipeline_id,
            &config.completion.model,
            config.chat.variant,
        ))
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Process one user message.
    ///
    /// Returns `Ok(None)` for blank input without touching the transcript.
    /// On upstream failure the user turn stays in the transcript and the
    /// error is returned; no assistant turn is added.
    pub async fn submit(
        &self,
        session: &mut ChatSession,
        query: &str,
    ) -> Result<Option<TurnOutcome>> {
        if query.trim().is_empty() {
            return Ok(None);
        }

        session.touch();
        session.transcript.push(Turn::user(query));
        tracing::info!(session = %session.id, "turn started");

        let nodes = self
            .retriever
            .retrieve(query, &self.pipeline_id)
            .await
            .inspect_err(|e| {
                tracing::error!(session = %session.id, error = %e, "retrieval failed");
            })?;
        tracing::debug!(session = %session.id, nodes = nodes.len(), "passages retrieved");

        let request = self.build_request(query, &nodes);
        let answer = self
            .completer
            .complete(&request)
            .await
            .and_then(|resp| resp.first_content())
            .inspect_err(|e| {
                tracing::error!(session = %session.id, error = %e, "completion failed");
            })?;

        session.transcript.push(Turn::assistant(answer.clone()));
        session.touch();
        tracing::info!(
            session = %session.id,
            model = %self.model,
            nodes = nodes.len(),
            "turn completed"
        );

        let sources = if self.variant.shows_sources() {
            nodes
        } else {
            Vec::new()
        };
        Ok(Some(TurnOutcome { answer, sources }))
    }

    /// System instruction with the passages, then the question as the user message.
    pub fn build_request(&self, query: &str, nodes: &[RetrievedNode]) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(prompt::system_instruction(self.variant, nodes)),
                ChatMessage::user(query),
            ],
        }
    }
}
