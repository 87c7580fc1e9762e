use std::sync::Arc;

use tracing::debug;

use crate::graph::{GraphStore, RetrievedChunk};
use crate::models::Embedder;
use crate::{Error, Result};

pub const DEFAULT_INDEX_NAME: &str = "text_embeddings";
pub const DEFAULT_TEXT_PROPERTY: &str = "text";

/// Vector similarity retriever over a named Neo4j index.
#[derive(Clone)]
pub struct VectorRetriever {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    index_name: String,
    text_property: String,
}

impl VectorRetriever {
    /// Retriever bound to `text_embeddings`, returning the `text` property.
    pub fn new(store: Arc<dyn GraphStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self::with_index(store, embedder, DEFAULT_INDEX_NAME, DEFAULT_TEXT_PROPERTY)
    }

    pub fn with_index(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        index_name: impl Into<String>,
        text_property: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            index_name: index_name.into(),
            text_property: text_property.into(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Embed `query` and return up to `top_k` nearest chunks.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let embedding = self.embedder.embed(query).await?;
        if embedding.is_empty() {
            return Err(Error::InvalidArgument(
                "Query produced an empty embedding".to_string(),
            ));
        }

        let chunks = self
            .store
            .vector_search(&self.index_name, top_k, &embedding, &self.text_property)
            .await?;

        debug!(
            index = %self.index_name,
            top_k,
            found = chunks.len(),
            "Vector search complete"
        );
        Ok(chunks)
    }
}
