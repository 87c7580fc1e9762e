//! Graph seeding.
//!
//! Two modes, selected by [`SeedMode`]:
//! - statements: run the bundled Cypher list, retrying the whole batch
//! - extraction: ingest source documents through the KG pipeline, then create
//!   the `text_embeddings` vector index (no retry)

pub mod extraction;
pub mod statements;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::config::{SeedMode, Settings};
use crate::graph::{GraphStore, Statement};
use crate::graphrag::{KgPipeline, PipelineReport, Vocabulary};
use crate::models::{GenerationOptions, ProviderRegistry};
use crate::retry::{retry_async, RetryPolicy};
use crate::Result;

pub use extraction::{create_vector_index, seed_documents, seed_from_documents};
pub use statements::political_statements;

/// What a seeding run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Statements { count: usize },
    Documents(Vec<(PathBuf, PipelineReport)>),
}

/// Run `statements` in one session. Any failure restarts the batch from the
/// first statement after the policy's pause.
pub async fn seed_statements(
    store: &dyn GraphStore,
    statements: &[Statement],
    policy: &RetryPolicy,
) -> Result<()> {
    retry_async(policy, "statement seeding", || store.run_batch(statements)).await?;
    info!("Seeding complete!");
    Ok(())
}

/// Seed `store` according to `settings.seed_mode`.
pub async fn run_seed(
    settings: &Settings,
    store: Arc<dyn GraphStore>,
    registry: &ProviderRegistry,
) -> Result<SeedOutcome> {
    match settings.seed_mode {
        SeedMode::Statements => {
            let statements = political_statements();
            info!("Seeding {} bundled statements", statements.len());
            seed_statements(store.as_ref(), &statements, &settings.retry_policy()).await?;
            Ok(SeedOutcome::Statements {
                count: statements.len(),
            })
        }
        SeedMode::Extraction => {
            let embedder = registry.embedder(settings.embedding_model_type.as_deref())?;
            let generator = registry.generator(
                settings.llm_model_type.as_deref(),
                &GenerationOptions::json(),
            )?;
            let pipeline =
                KgPipeline::new(store.clone(), embedder, generator, Vocabulary::political())?;

            info!("Seeding from {} document(s)", settings.seed_documents.len());
            let reports =
                seed_from_documents(&pipeline, store.as_ref(), &settings.seed_documents).await?;
            for (path, report) in &reports {
                info!("{}", extraction::describe(path, report));
            }
            Ok(SeedOutcome::Documents(reports))
        }
    }
}
