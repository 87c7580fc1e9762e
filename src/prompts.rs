//! Prompt templates.
//!
//! Each prompt has a built-in default. A Markdown file with the same name in
//! the `prompts/` directory overrides it.

use std::path::PathBuf;

use tracing::debug;

use crate::{Error, Result};

const RAG_ANSWER: &str = "Answer the Question using the following Context. Only respond with information mentioned in the Context. Do not inject any speculative information not mentioned.

    # Question:
    {query_text}

    # Context:
    {context}

    # Answer:
    ";

const KG_EXTRACTION: &str = r#"You are a top-tier algorithm designed for extracting information in structured formats to build a knowledge graph.

Extract the entities (nodes) and specify their type from the following text.
Also extract the relationships between these nodes.

Return result as JSON using the following format:
{"nodes": [ {"id": "0", "label": "Person", "properties": {"name": "John"} }],
"relationships": [{"type": "MEMBER_OF", "start_node_id": "0", "end_node_id": "1", "properties": {"details": "Description of the relationship"} }] }

Use only the following node labels: {entity_types}
Use only the following relationship types: {relation_types}

Assign a unique ID (string) to each node, and reuse it to define relationships.
Do respect the source and target node types for relationship and
the relationship direction.

Do not return any additional information other than the JSON in it.

Input text:

{text}
"#;

/// Available prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Question answering over retrieved context.
    RagAnswer,
    /// Knowledge-graph extraction from a text chunk (JSON output).
    KgExtraction,
}

impl Prompt {
    /// Prompt file name (Markdown).
    pub fn filename(&self) -> &'static str {
        match self {
            Prompt::RagAnswer => "rag_answer.md",
            Prompt::KgExtraction => "kg_extraction.md",
        }
    }

    /// Placeholders the template must contain.
    pub fn placeholders(&self) -> &'static [&'static str] {
        match self {
            Prompt::RagAnswer => &["{query_text}", "{context}"],
            Prompt::KgExtraction => &["{entity_types}", "{relation_types}", "{text}"],
        }
    }

    pub fn default_text(&self) -> &'static str {
        match self {
            Prompt::RagAnswer => RAG_ANSWER,
            Prompt::KgExtraction => KG_EXTRACTION,
        }
    }

    /// File override if present, built-in default otherwise.
    pub fn load(&self) -> Result<String> {
        let path = prompts_dir().join(self.filename());
        if !path.exists() {
            return Ok(self.default_text().to_string());
        }

        debug!("Loading prompt override from {}", path.display());
        let text = std::fs::read_to_string(&path).map_err(|e| {
            Error::InvalidArgument(format!("Failed to load prompt {}: {}", self.filename(), e))
        })?;
        self.validate(&text)?;
        Ok(text)
    }

    /// Check that `text` keeps every placeholder of this prompt.
    pub fn validate(&self, text: &str) -> Result<()> {
        match self.placeholders().iter().find(|p| !text.contains(**p)) {
            Some(missing) => Err(Error::InvalidArgument(format!(
                "Prompt {} is missing placeholder {}",
                self.filename(),
                missing
            ))),
            None => Ok(()),
        }
    }
}

/// Path to the prompts directory.
pub fn prompts_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PROMPTS_DIR") {
        return PathBuf::from(dir);
    }

    let candidates = [PathBuf::from("prompts"), PathBuf::from("../prompts")];
    for path in candidates {
        if path.exists() {
            return path;
        }
    }

    PathBuf::from("prompts")
}
