//! Graph RAG backend library
//!
//! This library provides:
//! - Neo4j connection establishment with a configurable retry policy
//! - Graph seeding from bundled Cypher statements or from documents via an
//!   LLM knowledge-graph extraction pipeline
//! - Embedding / generation providers (OpenAI, Mistral) behind a registry
//! - A query API answering questions from retrieved graph context, streamed
//!   as server-sent events

pub mod config;
pub mod error;
pub mod graph;
pub mod graphrag;
pub mod metrics;
pub mod models;
pub mod prompts;
pub mod retry;
pub mod seeder;
pub mod server;
pub mod sse;

// Re-export common types
pub use config::{SeedMode, Settings};
pub use error::{Error, Result};
pub use retry::RetryPolicy;
