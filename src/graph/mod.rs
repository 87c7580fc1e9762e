//! Graph store access
//!
//! `GraphStore` is the seam between the RAG/seeding code and Neo4j:
//! - `Neo4jStore` talks Bolt through `neo4rs`
//! - `MemoryGraphStore` records statements in-process (dry runs, tests)
//! - `connection::establish` opens a store and waits until `RETURN 1` succeeds

pub mod connection;
pub mod memory;
pub mod neo4j;

use async_trait::async_trait;

use crate::Result;

pub use connection::{connect_neo4j, establish};
pub use memory::MemoryGraphStore;
pub use neo4j::Neo4jStore;

/// Parameter value for a Cypher statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    FloatList(Vec<f64>),
    StringList(Vec<String>),
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&[f32]> for ParamValue {
    fn from(v: &[f32]) -> Self {
        ParamValue::FloatList(v.iter().map(|x| *x as f64).collect())
    }
}

impl From<Vec<f32>> for ParamValue {
    fn from(v: Vec<f32>) -> Self {
        ParamValue::from(v.as_slice())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::StringList(v)
    }
}

/// A Cypher statement with named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub cypher: String,
    pub params: Vec<(String, ParamValue)>,
}

impl Statement {
    pub fn new(cypher: impl Into<String>) -> Self {
        Self {
            cypher: cypher.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn get_param(&self, key: &str) -> Option<&ParamValue> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl From<&str> for Statement {
    fn from(cypher: &str) -> Self {
        Statement::new(cypher)
    }
}

/// Chunk text returned by a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f64,
}

/// Vector index definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorIndexSpec {
    pub name: String,
    pub label: String,
    pub property: String,
    pub dimensions: usize,
    pub similarity: String,
}

impl VectorIndexSpec {
    /// `text_embeddings` on `(:Chunk).embedding`, 1536 dims, cosine.
    pub fn text_embeddings() -> Self {
        Self {
            name: "text_embeddings".to_string(),
            label: "Chunk".to_string(),
            property: "embedding".to_string(),
            dimensions: 1536,
            similarity: "cosine".to_string(),
        }
    }

    /// `CREATE VECTOR INDEX ... IF NOT EXISTS` statement for this index.
    pub fn create_statement(&self) -> Statement {
        Statement::new(format!(
            "CREATE VECTOR INDEX `{}` IF NOT EXISTS \
             FOR (n:`{}`) ON (n.`{}`) \
             OPTIONS {{indexConfig: {{`vector.dimensions`: {}, `vector.similarity_function`: '{}'}}}}",
            self.name, self.label, self.property, self.dimensions, self.similarity
        ))
    }
}

/// Graph database operations used by the API and the seeder.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Trivial round-trip (`RETURN 1`).
    async fn ping(&self) -> Result<()>;

    /// Execute a single write/read statement, discarding rows.
    async fn run(&self, statement: &Statement) -> Result<()>;

    /// Execute statements in order within one session.
    async fn run_batch(&self, statements: &[Statement]) -> Result<()> {
        for statement in statements {
            self.run(statement).await?;
        }
        Ok(())
    }

    /// Top-k nearest chunks from a vector index, returning `text_property`.
    async fn vector_search(
        &self,
        index_name: &str,
        top_k: usize,
        embedding: &[f32],
        text_property: &str,
    ) -> Result<Vec<RetrievedChunk>>;
}
