//! Graph store backed by Neo4j

use async_trait::async_trait;
use neo4rs::{query, Graph, Query};
use tracing::{debug, info};

use super::{GraphStore, ParamValue, RetrievedChunk, Statement};
use crate::config::Neo4jSettings;
use crate::{Error, Result};

/// Neo4j connection handle (pooled by `neo4rs`).
#[derive(Clone)]
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    /// Open a connection pool. Liveness is not checked here; see
    /// [`crate::graph::establish`].
    pub async fn open(settings: &Neo4jSettings) -> Result<Self> {
        debug!(uri = %settings.uri, user = %settings.user, "Opening Neo4j connection");
        let graph = Graph::new(
            settings.uri.as_str(),
            settings.user.as_str(),
            settings.password.as_str(),
        )
        .await
        .map_err(|e| Error::ConnectionError(e.to_string()))?;

        Ok(Self { graph })
    }
}

/// Convert a statement into a `neo4rs` query with bound parameters.
fn to_query(statement: &Statement) -> Query {
    let mut q = query(&statement.cypher);
    for (key, value) in &statement.params {
        q = match value {
            ParamValue::String(v) => q.param(key, v.clone()),
            ParamValue::Int(v) => q.param(key, *v),
            ParamValue::Float(v) => q.param(key, *v),
            ParamValue::Bool(v) => q.param(key, *v),
            ParamValue::FloatList(v) => q.param(key, v.clone()),
            ParamValue::StringList(v) => q.param(key, v.clone()),
        };
    }
    q
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn ping(&self) -> Result<()> {
        self.graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| Error::ConnectionError(e.to_string()))
    }

    async fn run(&self, statement: &Statement) -> Result<()> {
        self.graph.run(to_query(statement)).await?;
        Ok(())
    }

    async fn run_batch(&self, statements: &[Statement]) -> Result<()> {
        let mut txn = self.graph.start_txn().await?;
        txn.run_queries(statements.iter().map(to_query)).await?;
        txn.commit().await?;
        info!("Executed {} statements in one transaction", statements.len());
        Ok(())
    }

    async fn vector_search(
        &self,
        index_name: &str,
        top_k: usize,
        embedding: &[f32],
        text_property: &str,
    ) -> Result<Vec<RetrievedChunk>> {
        let q = query(
            "CALL db.index.vector.queryNodes($index_name, $top_k, $query_vector)
             YIELD node, score
             RETURN node[$property] AS text, score",
        )
        .param("index_name", index_name)
        .param("top_k", top_k as i64)
        .param(
            "query_vector",
            embedding.iter().map(|x| *x as f64).collect::<Vec<f64>>(),
        )
        .param("property", text_property);

        let mut result = self.graph.execute(q).await?;
        let mut chunks = Vec::new();

        while let Some(row) = result.next().await? {
            let text: Option<String> = row
                .get("text")
                .map_err(|e| Error::GraphError(format!("bad text column: {}", e)))?;
            let score: f64 = row.get("score").unwrap_or(0.0);
            if let Some(text) = text {
                chunks.push(RetrievedChunk { text, score });
            }
        }

        debug!(index_name, top_k, found = chunks.len(), "Vector search finished");
        Ok(chunks)
    }
}
