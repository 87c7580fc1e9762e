//! Extraction-mode seeding: documents → knowledge graph → vector index.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::graph::{GraphStore, VectorIndexSpec};
use crate::graphrag::{KgPipeline, PipelineReport};
use crate::Result;

/// Run the pipeline for each document in order. The first failing document
/// aborts seeding; nothing is retried.
pub async fn seed_documents(
    pipeline: &KgPipeline,
    documents: &[PathBuf],
) -> Result<Vec<(PathBuf, PipelineReport)>> {
    let mut reports = Vec::with_capacity(documents.len());
    for path in documents {
        let report = pipeline.run(path).await?;
        reports.push((path.clone(), report));
    }
    Ok(reports)
}

/// `CREATE VECTOR INDEX ... IF NOT EXISTS` for `index`.
pub async fn create_vector_index(store: &dyn GraphStore, index: &VectorIndexSpec) -> Result<()> {
    store.run(&index.create_statement()).await?;
    info!(
        "Vector index {} on :{}({}) ready ({} dims, {})",
        index.name, index.label, index.property, index.dimensions, index.similarity
    );
    Ok(())
}

/// Documents, then the `text_embeddings` index.
pub async fn seed_from_documents(
    pipeline: &KgPipeline,
    store: &dyn GraphStore,
    documents: &[PathBuf],
) -> Result<Vec<(PathBuf, PipelineReport)>> {
    let reports = seed_documents(pipeline, documents).await?;
    create_vector_index(store, &VectorIndexSpec::text_embeddings()).await?;
    Ok(reports)
}

pub fn describe(path: &Path, report: &PipelineReport) -> String {
    format!(
        "{}: {} chunks, {} nodes, {} relationships",
        path.display(),
        report.chunks,
        report.nodes,
        report.relationships
    )
}
