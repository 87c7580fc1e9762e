//! LLM-driven knowledge-graph extraction.
//!
//! The generator is asked (in JSON mode) for
//! `{"nodes": [...], "relationships": [...]}`; the answer is parsed, then
//! filtered against the allowed vocabulary.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::chunker::Chunk;
use crate::models::Generator;
use crate::prompts::Prompt;
use crate::{Error, Result};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex")
});

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("code fence regex")
});

/// True if `name` can be used unquoted as a label, type or property key.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Allowed node labels and relationship types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    pub entities: Vec<String>,
    pub relations: Vec<String>,
}

impl Vocabulary {
    pub fn new<E, R>(entities: E, relations: R) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            entities: entities.into_iter().map(Into::into).collect(),
            relations: relations.into_iter().map(Into::into).collect(),
        }
    }

    /// Political-domain vocabulary used for seeding.
    pub fn political() -> Self {
        Self::new(
            [
                "Person",
                "Position",
                "PoliticalParty",
                "Direction",
                "Value",
                "Goal",
                "Consequence",
            ],
            [
                "HOLDS",
                "MEMBER_OF",
                "SUPPORTS",
                "OPPOSES",
                "PURSUES",
                "LEADS_TO",
                "ALIGNED_WITH",
            ],
        )
    }

    fn entity(&self, label: &str) -> Option<&str> {
        self.entities
            .iter()
            .find(|e| e.eq_ignore_ascii_case(label))
            .map(String::as_str)
    }

    fn relation(&self, kind: &str) -> Option<&str> {
        self.relations
            .iter()
            .find(|r| r.eq_ignore_ascii_case(kind))
            .map(String::as_str)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::political()
    }
}

/// Extracted node. `id` is local to one extraction answer.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub properties: Vec<(String, String)>,
}

impl GraphNode {
    /// `name` property if present, else the id.
    pub fn name(&self) -> &str {
        self.properties
            .iter()
            .find(|(k, _)| k == "name")
            .map(|(_, v)| v.as_str())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphRelationship {
    pub start_node_id: String,
    pub end_node_id: String,
    pub kind: String,
    pub properties: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedGraph {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

#[derive(Debug, Deserialize)]
struct RawGraph {
    #[serde(default)]
    nodes: Vec<RawNode>,
    #[serde(default)]
    relationships: Vec<RawRelationship>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    id: Value,
    label: String,
    #[serde(default)]
    properties: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawRelationship {
    #[serde(rename = "type")]
    kind: String,
    start_node_id: Value,
    end_node_id: Value,
    #[serde(default)]
    properties: HashMap<String, Value>,
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn properties(raw: HashMap<String, Value>) -> Vec<(String, String)> {
    let mut props: Vec<(String, String)> = raw
        .into_iter()
        .filter(|(k, _)| is_identifier(k) && k != "id")
        .filter_map(|(k, v)| scalar(&v).map(|v| (k, v)))
        .collect();
    props.sort();
    props
}

/// Parse an extraction answer and keep only what the vocabulary allows.
///
/// Relationships whose endpoints were dropped (or never declared) are
/// dropped too.
pub fn parse_graph(raw: &str, vocabulary: &Vocabulary) -> Result<ExtractedGraph> {
    let body = CODE_FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map_or(raw, |m| m.as_str());

    let parsed: RawGraph = serde_json::from_str(body.trim()).map_err(|e| {
        Error::SerializationError(format!("Invalid extraction output: {}", e))
    })?;

    let mut graph = ExtractedGraph::default();
    let mut ids = HashSet::new();

    for node in parsed.nodes {
        let Some(id) = scalar(&node.id) else {
            continue;
        };
        let Some(label) = vocabulary.entity(&node.label) else {
            debug!("Dropping node {} with label {}", id, node.label);
            continue;
        };
        if !ids.insert(id.clone()) {
            continue;
        }
        graph.nodes.push(GraphNode {
            id,
            label: label.to_string(),
            properties: properties(node.properties),
        });
    }

    for rel in parsed.relationships {
        let Some(kind) = vocabulary.relation(&rel.kind) else {
            debug!("Dropping relationship of type {}", rel.kind);
            continue;
        };
        let (Some(start), Some(end)) = (scalar(&rel.start_node_id), scalar(&rel.end_node_id))
        else {
            continue;
        };
        if !ids.contains(&start) || !ids.contains(&end) {
            continue;
        }
        graph.relationships.push(GraphRelationship {
            start_node_id: start,
            end_node_id: end,
            kind: kind.to_string(),
            properties: properties(rel.properties),
        });
    }

    Ok(graph)
}

/// Runs the extraction prompt for one chunk at a time.
pub struct GraphExtractor {
    generator: Arc<dyn Generator>,
    vocabulary: Vocabulary,
    template: String,
}

impl GraphExtractor {
    pub fn new(generator: Arc<dyn Generator>, vocabulary: Vocabulary) -> Result<Self> {
        Ok(Self::with_template(
            generator,
            vocabulary,
            Prompt::KgExtraction.load()?,
        ))
    }

    pub fn with_template(
        generator: Arc<dyn Generator>,
        vocabulary: Vocabulary,
        template: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            vocabulary,
            template: template.into(),
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn prompt(&self, text: &str) -> String {
        self.template
            .replace("{entity_types}", &self.vocabulary.entities.join(", "))
            .replace("{relation_types}", &self.vocabulary.relations.join(", "))
            .replace("{text}", text)
    }

    pub async fn extract(&self, chunk: &Chunk) -> Result<ExtractedGraph> {
        let answer = self.generator.complete(&self.prompt(&chunk.text)).await?;
        let graph = parse_graph(&answer, &self.vocabulary).map_err(|e| {
            warn!("Chunk {} produced unparseable extraction", chunk.index);
            e
        })?;
        debug!(
            "Chunk {}: {} nodes, {} relationships",
            chunk.index,
            graph.nodes.len(),
            graph.relationships.len()
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextStream;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Canned {
        answer: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for Canned {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.answer.clone())
        }

        async fn stream(&self, _prompt: &str) -> Result<TextStream> {
            Err(Error::ProviderError("not streaming".into()))
        }
    }

    const ANSWER: &str = r#"{
        "nodes": [
            {"id": "0", "label": "Person", "properties": {"name": "Ada Vale", "age": 52}},
            {"id": 1, "label": "politicalparty", "properties": {"name": "Unity"}},
            {"id": "2", "label": "Planet", "properties": {"name": "Mars"}}
        ],
        "relationships": [
            {"type": "MEMBER_OF", "start_node_id": "0", "end_node_id": "1"},
            {"type": "ORBITS", "start_node_id": "0", "end_node_id": "1"},
            {"type": "SUPPORTS", "start_node_id": "0", "end_node_id": "2"}
        ]
    }"#;

    #[test]
    fn parse_filters_by_vocabulary() {
        let graph = parse_graph(ANSWER, &Vocabulary::political()).unwrap();

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].name(), "Ada Vale");
        assert_eq!(graph.nodes[1].label, "PoliticalParty");
        assert_eq!(graph.nodes[1].id, "1");

        assert_eq!(graph.relationships.len(), 1);
        assert_eq!(graph.relationships[0].kind, "MEMBER_OF");
    }

    #[test]
    fn parse_keeps_scalar_properties_sorted() {
        let graph = parse_graph(ANSWER, &Vocabulary::political()).unwrap();
        assert_eq!(
            graph.nodes[0].properties,
            vec![
                ("age".to_string(), "52".to_string()),
                ("name".to_string(), "Ada Vale".to_string())
            ]
        );
    }

    #[test]
    fn parse_accepts_fenced_json() {
        let raw = "```json\n{\"nodes\": [{\"id\": \"a\", \"label\": \"Goal\"}]}\n```";
        let graph = parse_graph(raw, &Vocabulary::political()).unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].name(), "a");
    }

    #[test]
    fn parse_rejects_non_json() {
        let err = parse_graph("no graph here", &Vocabulary::political()).unwrap_err();
        assert!(matches!(err, Error::SerializationError(_)));
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("name"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("a b"));
        assert!(!is_identifier("n}) DETACH DELETE (m"));
    }

    #[tokio::test]
    async fn extract_renders_vocabulary_into_prompt() {
        let generator = Arc::new(Canned {
            answer: ANSWER.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let extractor = GraphExtractor::with_template(
            generator.clone(),
            Vocabulary::political(),
            Prompt::KgExtraction.default_text(),
        );

        let chunk = Chunk::new(0, "Ada Vale joined Unity.".to_string(), 0, 22);
        let graph = extractor.extract(&chunk).await.unwrap();
        assert_eq!(graph.nodes.len(), 2);

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("Person, Position, PoliticalParty"));
        assert!(prompts[0].contains("HOLDS, MEMBER_OF"));
        assert!(prompts[0].contains("Ada Vale joined Unity."));
    }
}
