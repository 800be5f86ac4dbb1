//! Prompt construction for the two chat variants.
//!
//! | Variant | Context block | Persona |
//! |---------|---------------|---------|
//! | [`Variant::Strict`] | numbered `---SOURCE i---` sections with metadata | strict grounding rules, citations required |
//! | [`Variant::Simple`] | passage texts joined by blank lines | one loose instruction |
//!
//! Passages always appear exactly once and in retrieval order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::RetrievedNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Numbered sources, strict rules, source panel after each answer.
    #[default]
    Strict,
    /// Plain context, loose instruction, no source panel.
    Simple,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Strict => "strict",
            Variant::Simple => "simple",
        }
    }

    /// Whether answers are followed by the retrieved passages.
    pub fn shows_sources(&self) -> bool {
        matches!(self, Variant::Strict)
    }

    /// Whether this variant's page carries the password gate.
    pub fn supports_gate(&self) -> bool {
        matches!(self, Variant::Strict)
    }
}

const STRICT_PERSONA: &str = "You are a helpful assistant for Alcoholics Anonymous literature. Follow these rules strictly:

1. ONLY use information from the provided context below - never use your general knowledge about AA
2. NEVER speculate or make assumptions
3. If the context doesn't contain the answer, say \"I don't find that information in the literature provided\"
4. If a question is unclear, ask clarifying questions before answering
5. Always cite which book and source number the information comes from (e.g., \"According to the Big Book [Source 1]...\")
6. When quoting directly, use quotation marks and reference the source number

Context from AA Literature:
";

const SIMPLE_PERSONA: &str = "You are a helpful assistant knowledgeable about AA literature. Use the following context from the Big Book and Twelve Steps and Twelve Traditions to answer questions accurately. If the answer isn't in the context, say so.

Context:
";

/// Build the context block embedded in the system instruction.
pub fn build_context(variant: Variant, nodes: &[RetrievedNode]) -> String {
    match variant {
        Variant::Strict => {
            let mut out = String::new();
            for (i, node) in nodes.iter().enumerate() {
                out.push_str(&format!("\n\n---SOURCE {}---\n", i + 1));
                out.push_str(&format!("Text: {}\n", node.text));
                if let Some(ref metadata) = node.metadata {
                    out.push_str(&format!("Metadata: {}\n", format_metadata(metadata)));
                }
            }
            out
        }
        Variant::Simple => nodes
            .iter()
            .map(|n| n.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

/// Persona text followed by the context block.
pub fn system_instruction(variant: Variant, nodes: &[RetrievedNode]) -> String {
    let persona = match variant {
        Variant::Strict => STRICT_PERSONA,
        Variant::Simple => SIMPLE_PERSONA,
    };
    format!("{}{}", persona, build_context(variant, nodes))
}

/// Markdown for the collapsible "View Source Material" panel.
pub fn render_sources(nodes: &[RetrievedNode]) -> String {
    let mut out = String::new();
    for (i, node) in nodes.iter().enumerate() {
        out.push_str(&format!("**Source {}:**\n\n", i + 1));
        for line in node.text.lines() {
            out.push_str("> ");
            out.push_str(line);
            out.push('\n');
        }
        if let Some(ref metadata) = node.metadata {
            out.push_str(&format!("\n_Metadata: {}_\n", format_metadata(metadata)));
        }
        out.push_str("\n---\n\n");
    }
    out
}

pub fn format_metadata(metadata: &Map<String, Value>) -> String {
    Value::Object(metadata.clone()).to_string()
}
