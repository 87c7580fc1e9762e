//! Document → knowledge graph ingestion.
//!
//! load → chunk → extract (LLM, JSON mode) → embed → write. All statements for
//! one document go to the store as a single batch, after every chunk has been
//! extracted and embedded, so a failing document writes nothing.

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::chunker::{Chunk, Chunker};
use super::extractor::{is_identifier, ExtractedGraph, GraphExtractor, Vocabulary};
use crate::graph::{GraphStore, ParamValue, Statement};
use crate::models::{Embedder, Generator};
use crate::{Error, Result};

/// Counts of what one pipeline run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub chunks: usize,
    pub nodes: usize,
    pub relationships: usize,
}

/// Read a source document as plain text (`.pdf` via `pdf-extract`).
pub async fn load_document(path: &Path) -> Result<String> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    if !is_pdf {
        return tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::DocumentError(format!("Failed to read {}: {}", path.display(), e))
        });
    }

    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
        .await
        .map_err(|e| Error::DocumentError(format!("PDF task failed: {}", e)))?
        .map_err(|e| Error::DocumentError(format!("Failed to parse {}: {}", path.display(), e)))
}

pub struct KgPipeline {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    extractor: GraphExtractor,
    chunker: Chunker,
}

impl KgPipeline {
    /// Pipeline with the default chunker and the extraction prompt from
    /// [`crate::prompts::Prompt::KgExtraction`]. `generator` should be built
    /// in JSON mode.
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        vocabulary: Vocabulary,
    ) -> Result<Self> {
        Self::from_parts(
            store,
            embedder,
            GraphExtractor::new(generator, vocabulary)?,
            Chunker::default(),
        )
    }

    pub fn from_parts(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        extractor: GraphExtractor,
        chunker: Chunker,
    ) -> Result<Self> {
        let vocabulary = extractor.vocabulary();
        if let Some(bad) = vocabulary
            .entities
            .iter()
            .chain(vocabulary.relations.iter())
            .find(|name| !is_identifier(name))
        {
            return Err(Error::InvalidArgument(format!(
                "Vocabulary entry '{}' is not a valid identifier",
                bad
            )));
        }

        Ok(Self {
            store,
            embedder,
            extractor,
            chunker,
        })
    }

    /// Ingest one document from disk.
    pub async fn run(&self, path: &Path) -> Result<PipelineReport> {
        info!("Loading document {}", path.display());
        let text = load_document(path).await?;
        self.run_text(&path.display().to_string(), &text).await
    }

    /// Ingest already-loaded text. `source` is stored on the `Document` node.
    pub async fn run_text(&self, source: &str, text: &str) -> Result<PipelineReport> {
        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            return Err(Error::DocumentError(format!("{} contains no text", source)));
        }
        info!("{}: {} chunks", source, chunks.len());

        let mut graphs = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            graphs.push(self.extractor.extract(chunk).await?);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::ProviderError(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let document_id = Uuid::new_v4().to_string();
        let mut statements = vec![Statement::new(
            "CREATE (d:Document {id: $id, path: $path})",
        )
        .param("id", document_id.as_str())
        .param("path", source)];

        let mut report = PipelineReport {
            chunks: chunks.len(),
            ..Default::default()
        };

        for ((chunk, embedding), graph) in chunks.iter().zip(embeddings).zip(&graphs) {
            statements.push(chunk_statement(&document_id, chunk, embedding));
            report.nodes += graph.nodes.len();
            report.relationships += graph.relationships.len();
            statements.extend(graph_statements(chunk, graph));
        }

        self.store.run_batch(&statements).await?;

        info!(
            "{}: wrote {} chunks, {} nodes, {} relationships",
            source, report.chunks, report.nodes, report.relationships
        );
        Ok(report)
    }
}

fn chunk_statement(document_id: &str, chunk: &Chunk, embedding: Vec<f32>) -> Statement {
    Statement::new(
        "MATCH (d:Document {id: $document_id}) \
         CREATE (c:Chunk {id: $id, index: $index, text: $text, embedding: $embedding}) \
         CREATE (c)-[:FROM_DOCUMENT]->(d)",
    )
    .param("document_id", document_id)
    .param("id", chunk.id.to_string())
    .param("index", chunk.index)
    .param("text", chunk.text.as_str())
    .param("embedding", embedding)
}

/// ` SET var.`key` = $pN` for each property, binding the values into `params`.
fn set_clause(
    var: &str,
    properties: &[(String, String)],
    params: &mut Vec<(String, ParamValue)>,
) -> String {
    let mut clause = String::new();
    for (i, (key, value)) in properties.iter().enumerate() {
        let name = format!("p{}", i);
        clause.push_str(&format!(" SET {}.`{}` = ${}", var, key, name));
        params.push((name, value.as_str().into()));
    }
    clause
}

/// Entity MERGE keyed on the node name, so the same entity mentioned in
/// several chunks becomes one node.
fn graph_statements(chunk: &Chunk, graph: &ExtractedGraph) -> Vec<Statement> {
    let mut out = Vec::with_capacity(graph.nodes.len() + graph.relationships.len());

    for node in &graph.nodes {
        let mut statement = Statement::new("")
            .param("id", node.name())
            .param("chunk_id", chunk.id.to_string());
        let props: Vec<(String, String)> = node
            .properties
            .iter()
            .filter(|(k, _)| k != "name")
            .cloned()
            .collect();
        let sets = set_clause("n", &props, &mut statement.params);
        statement.cypher = format!(
            "MERGE (n:`{}` {{id: $id}}) SET n.name = $id{} \
             WITH n MATCH (c:Chunk {{id: $chunk_id}}) MERGE (n)-[:FROM_CHUNK]->(c)",
            node.label, sets
        );
        out.push(statement);
    }

    for rel in &graph.relationships {
        let (Some(start), Some(end)) = (
            graph.nodes.iter().find(|n| n.id == rel.start_node_id),
            graph.nodes.iter().find(|n| n.id == rel.end_node_id),
        ) else {
            continue;
        };

        let mut statement = Statement::new("")
            .param("start", start.name())
            .param("end", end.name());
        let sets = set_clause("r", &rel.properties, &mut statement.params);
        statement.cypher = format!(
            "MATCH (a:`{}` {{id: $start}}), (b:`{}` {{id: $end}}) MERGE (a)-[r:`{}`]->(b){}",
            start.label, end.label, rel.kind, sets
        );
        out.push(statement);
    }

    out
}
