//! One-shot graph seeder.
//!
//! Waits for Neo4j, then seeds it when `SEED=true` (or `--force`) using the
//! configured mode. `--dry-run` records statements in memory instead of
//! writing them and prints them to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use graphrag_backend::graph::{connect_neo4j, GraphStore, MemoryGraphStore};
use graphrag_backend::models::ProviderRegistry;
use graphrag_backend::seeder::extraction::describe;
use graphrag_backend::seeder::{run_seed, SeedOutcome};
use graphrag_backend::{SeedMode, Settings};

#[derive(Parser)]
#[command(name = "seeder")]
#[command(about = "Populate the Neo4j knowledge graph")]
struct Cli {
    /// statements | extraction, overrides SEED_MODE
    #[arg(long)]
    mode: Option<SeedMode>,

    /// Source documents for extraction mode, overrides SEED_DOCUMENTS
    #[arg(long = "document")]
    documents: Vec<PathBuf>,

    /// Seed even when SEED is not "true"
    #[arg(long)]
    force: bool,

    /// Print statements instead of writing to Neo4j
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("graphrag_backend=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::new();

    if !settings.seed && !cli.force {
        warn!("SEED is not \"true\"; nothing to do (pass --force to seed anyway)");
        return Ok(());
    }

    if let Some(mode) = cli.mode {
        settings.seed_mode = mode;
    }
    if !cli.documents.is_empty() {
        settings.seed_documents = cli.documents;
    }

    let registry = ProviderRegistry::with_defaults();

    if cli.dry_run {
        let memory = MemoryGraphStore::new();
        let outcome = run_seed(&settings, Arc::new(memory.clone()), &registry).await?;
        for statement in memory.committed() {
            println!("{};", statement.cypher);
        }
        report(&outcome);
        return Ok(());
    }

    info!("Connecting to: {}", settings.neo4j.uri);
    let store: Arc<dyn GraphStore> =
        Arc::new(connect_neo4j(&settings.neo4j, &settings.retry_policy()).await?);

    let outcome = run_seed(&settings, store, &registry).await?;
    report(&outcome);
    Ok(())
}

fn report(outcome: &SeedOutcome) {
    match outcome {
        SeedOutcome::Statements { count } => info!("Applied {} statements", count),
        SeedOutcome::Documents(reports) => {
            for (path, report) in reports {
                println!("{}", describe(path, report));
            }
        }
    }
}
