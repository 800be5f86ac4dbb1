//! Retrieval service client.
//!
//! Passage search is delegated to a hosted LlamaCloud pipeline. The
//! [`Retriever`] trait is the seam the controller depends on;
//! [`LlamaCloudRetriever`] is the HTTP implementation.
//!
//! # Wire format
//!
//! ```text
//! POST {base_url}/api/v1/pipelines/{pipeline_id}/retrieve
//! Authorization: Bearer <LLAMACLOUD_API_KEY>
//! {"query": "..."}
//!
//! 200 {"retrieval_nodes": [{"node": {"text": "...", "metadata": {...}}, "score": 0.8}]}
//! ```
//!
//! Failures are returned as-is. There is no retry and no fallback.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::RetrievalConfig;
use crate::models::RetrievedNode;

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Fetch passages for `query` from the corpus selected by `pipeline_id`,
    /// in the order the service ranks them.
    async fn retrieve(&self, query: &str, pipeline_id: &str) -> Result<Vec<RetrievedNode>>;
}

pub struct LlamaCloudRetriever {
    client: reqwest::Client,
    base_url: reqwest::Url,
    api_key: String,
}

impl LlamaCloudRetriever {
    pub fn new(config: &RetrievalConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build retrieval HTTP client")?;

        let base_url = reqwest::Url::parse(config.base_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid retrieval base URL: {}", config.base_url))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// The pipeline id is pushed as one percent-encoded path segment.
    fn endpoint(&self, pipeline_id: &str) -> Result<reqwest::Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("retrieval base URL cannot carry a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(["api", "v1", "pipelines", pipeline_id, "retrieve"]);
        Ok(url)
    }
}

#[derive(Deserialize)]
struct RetrieveResponse {
    retrieval_nodes: Vec<ScoredNode>,
}

#[derive(Deserialize)]
struct ScoredNode {
    node: NodeBody,
}

#[derive(Deserialize)]
struct NodeBody {
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[async_trait]
impl Retriever for LlamaCloudRetriever {
    async fn retrieve(&self, query: &str, pipeline_id: &str) -> Result<Vec<RetrievedNode>> {
        let resp = self
            .client
            .post(self.endpoint(pipeline_id)?)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .context("retrieval service request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "retrieval service returned an error");
            bail!("retrieval service error {}: {}", status, body_text);
        }

        let parsed: RetrieveResponse = resp
            .json()
            .await
            .context("Invalid retrieval response: missing retrieval_nodes")?;

        Ok(parsed
            .retrieval_nodes
            .into_iter()
            .map(|scored| {
                let node = RetrievedNode::new(scored.node.text);
                match scored.node.metadata {
                    Some(m) => node.with_metadata(m),
                    None => node,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_trailing_slash() {
        let config = RetrievalConfig {
            base_url: "https://api.cloud.llamaindex.ai/".to_string(),
            timeout_secs: 5,
        };
        let r = LlamaCloudRetriever::new(&config, "key").unwrap();
        assert_eq!(
            r.endpoint("pipe-1").unwrap().as_str(),
            "https://api.cloud.llamaindex.ai/api/v1/pipelines/pipe-1/retrieve"
        );
    }

    #[test]
    fn endpoint_encodes_pipeline_id() {
        let config = RetrievalConfig {
            base_url: "https://h/prefix/".to_string(),
            timeout_secs: 5,
        };
        let r = LlamaCloudRetriever::new(&config, "key").unwrap();
        let url = r.endpoint("abc/../x?y#z").unwrap();
        assert_eq!(
            url.as_str(),
            "https://h/prefix/api/v1/pipelines/abc%2F..%2Fx%3Fy%23z/retrieve"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn response_tolerates_missing_metadata_and_extra_fields() {
        let raw = r#"{
            "pipeline_id": "pipe-1",
            "retrieval_nodes": [
                {"node": {"id_": "n1", "text": "alpha", "metadata": {"page": 5}}, "score": 0.9},
                {"node": {"id_": "n2", "text": "beta"}, "score": 0.4}
            ]
        }"#;
        let parsed: RetrieveResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.retrieval_nodes.len(), 2);
        assert_eq!(parsed.retrieval_nodes[0].node.text, "alpha");
        assert!(parsed.retrieval_nodes[1].node.metadata.is_none());
    }
}
