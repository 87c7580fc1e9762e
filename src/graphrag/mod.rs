//! Graph RAG: retrieval over Neo4j chunk embeddings + LLM answer generation.
//!
//! The query path is retrieve (vector index, top-k) → render [`RagTemplate`]
//! → generate, either as one string or as a stream of fragments. The
//! ingestion side ([`pipeline::KgPipeline`]) builds the graph the retriever
//! reads from.

pub mod chunker;
pub mod extractor;
pub mod pipeline;
pub mod retriever;
pub mod template;

use std::sync::Arc;

use tracing::info;

use crate::models::{Generator, TextStream};
use crate::Result;

pub use chunker::{Chunk, Chunker};
pub use extractor::{ExtractedGraph, GraphExtractor, Vocabulary};
pub use pipeline::{KgPipeline, PipelineReport};
pub use retriever::VectorRetriever;
pub use template::RagTemplate;

/// Chunks retrieved per question.
pub const TOP_K: usize = 5;

pub struct GraphRag {
    retriever: VectorRetriever,
    generator: Arc<dyn Generator>,
    template: RagTemplate,
    top_k: usize,
}

impl GraphRag {
    pub fn new(
        retriever: VectorRetriever,
        generator: Arc<dyn Generator>,
        template: RagTemplate,
    ) -> Self {
        Self {
            retriever,
            generator,
            template,
            top_k: TOP_K,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve context for `query` and render the full prompt.
    pub async fn prompt(&self, query: &str) -> Result<String> {
        let chunks = self.retriever.search(query, self.top_k).await?;
        let context = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        info!(
            "Retrieved {} chunks for query ({} chars of context)",
            chunks.len(),
            context.len()
        );
        Ok(self.template.format(query, &context))
    }

    /// Complete answer in one piece.
    pub async fn answer(&self, query: &str) -> Result<String> {
        let prompt = self.prompt(query).await?;
        self.generator.complete(&prompt).await
    }

    /// Answer as a stream of fragments. Retrieval happens before this returns.
    pub async fn answer_stream(&self, query: &str) -> Result<TextStream> {
        let prompt = self.prompt(query).await?;
        self.generator.stream(&prompt).await
    }
}
