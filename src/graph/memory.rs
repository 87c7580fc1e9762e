//! In-process graph store.
//!
//! Records every statement it is asked to run and answers similarity searches
//! from a list of preloaded chunk texts (in insertion order, no ranking). Used
//! by the seeder's `--dry-run` and by tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{GraphStore, RetrievedChunk, Statement};
use crate::{Error, Result};

/// Arguments of one `vector_search` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCall {
    pub index_name: String,
    pub top_k: usize,
    pub dimensions: usize,
    pub text_property: String,
}

#[derive(Debug, Default)]
struct State {
    attempted: Vec<Statement>,
    committed: Vec<Statement>,
    chunks: Vec<String>,
    searches: Vec<SearchCall>,
    pings: u32,
    ping_failures: u32,
    failing_runs: HashSet<usize>,
    runs: usize,
}

/// Cheaply clonable; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraphStore {
    state: Arc<Mutex<State>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail the next `count` pings.
    pub fn with_ping_failures(self, count: u32) -> Self {
        self.lock().ping_failures = count;
        self
    }

    /// Fail the `n`-th call to `run` (1-based, counted across batches).
    pub fn with_failing_run(self, n: usize) -> Self {
        self.lock().failing_runs.insert(n);
        self
    }

    /// Preload chunk texts served by `vector_search`.
    pub fn with_chunks<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().chunks.extend(chunks.into_iter().map(Into::into));
        self
    }

    /// Every statement `run` was called with, including failed ones.
    pub fn attempted(&self) -> Vec<Statement> {
        self.lock().attempted.clone()
    }

    /// Statements that ran successfully.
    pub fn committed(&self) -> Vec<Statement> {
        self.lock().committed.clone()
    }

    pub fn searches(&self) -> Vec<SearchCall> {
        self.lock().searches.clone()
    }

    pub fn ping_count(&self) -> u32 {
        self.lock().pings
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn ping(&self) -> Result<()> {
        let mut state = self.lock();
        state.pings += 1;
        if state.ping_failures > 0 {
            state.ping_failures -= 1;
            return Err(Error::ConnectionError("connection refused".to_string()));
        }
        Ok(())
    }

    async fn run(&self, statement: &Statement) -> Result<()> {
        let mut state = self.lock();
        state.runs += 1;
        state.attempted.push(statement.clone());

        let call = state.runs;
        if state.failing_runs.remove(&call) {
            return Err(Error::GraphError(format!(
                "statement {} rejected: {}",
                call, statement.cypher
            )));
        }

        state.committed.push(statement.clone());
        Ok(())
    }

    async fn vector_search(
        &self,
        index_name: &str,
        top_k: usize,
        embedding: &[f32],
        text_property: &str,
    ) -> Result<Vec<RetrievedChunk>> {
        let mut state = self.lock();
        state.searches.push(SearchCall {
            index_name: index_name.to_string(),
            top_k,
            dimensions: embedding.len(),
            text_property: text_property.to_string(),
        });

        Ok(state
            .chunks
            .iter()
            .take(top_k)
            .map(|text| RetrievedChunk {
                text: text.clone(),
                score: 1.0,
            })
            .collect())
    }
}
