#![allow(dead_code)]

use aa_chat::completion::{Completer, CompletionRequest, CompletionResponse};
use aa_chat::controller::ChatController;
use aa_chat::models::RetrievedNode;
use aa_chat::prompt::Variant;
use aa_chat::retrieval::Retriever;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PIPELINE_ID: &str = "pipe-test";
pub const MODEL: &str = "anthropic/claude-3.5-sonnet";

/// Returns fixed passages and records every query it sees.
pub struct FakeRetriever {
    nodes: Vec<RetrievedNode>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FakeRetriever {
    pub fn new(nodes: Vec<RetrievedNode>) -> Arc<Self> {
        Arc::new(Self {
            nodes,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn retrieve(&self, query: &str, pipeline_id: &str) -> Result<Vec<RetrievedNode>> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), pipeline_id.to_string()));
        Ok(self.nodes.clone())
    }
}

pub struct FailingRetriever;

#[async_trait]
impl Retriever for FailingRetriever {
    async fn retrieve(&self, _query: &str, _pipeline_id: &str) -> Result<Vec<RetrievedNode>> {
        anyhow::bail!("retrieval service error 401 Unauthorized: invalid api key")
    }
}

/// Answers with a fixed string and records every request.
pub struct FakeCompleter {
    answer: Option<String>,
    delay: Duration,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeCompleter {
    pub fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer.to_string()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Responds with an empty `choices` array.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(answer: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer.to_string()),
            delay,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Completer for FakeCompleter {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let body = match &self.answer {
            Some(a) => serde_json::json!({ "choices": [{ "message": { "content": a } }] }),
            None => serde_json::json!({ "choices": [] }),
        };
        Ok(serde_json::from_value(body)?)
    }
}

pub fn controller(
    retriever: Arc<dyn Retriever>,
    completer: Arc<dyn Completer>,
    variant: Variant,
) -> ChatController {
    ChatController::new(retriever, completer, PIPELINE_ID, MODEL, variant)
}

pub fn step_four() -> RetrievedNode {
    RetrievedNode::new("Step Four: Made a searching and fearless moral inventory...")
}
