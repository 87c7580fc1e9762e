//! Graph RAG backend - main entry point
//!
//! `serve` (default) connects to Neo4j, optionally seeds it when `SEED=true`,
//! and runs the query API. `seed` only seeds.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use graphrag_backend::graph::{connect_neo4j, GraphStore};
use graphrag_backend::models::ProviderRegistry;
use graphrag_backend::seeder::{run_seed, SeedOutcome};
use graphrag_backend::server::{self, AppState};
use graphrag_backend::{SeedMode, Settings};

#[derive(Parser)]
#[command(name = "graphrag_backend")]
#[command(about = "Question answering over a Neo4j knowledge graph", long_about = None)]
#[command(version)]
struct Cli {
    /// YAML config file (defaults to ./config.yml when present)
    #[arg(long, env = "GRAPHRAG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the query API (seeding first when SEED=true)
    Serve {
        /// Listen address, overrides API_ADDR
        #[arg(long)]
        addr: Option<String>,
    },

    /// Seed the graph and exit
    Seed {
        /// statements | extraction, overrides SEED_MODE
        #[arg(long)]
        mode: Option<SeedMode>,

        /// Source documents for extraction mode, overrides SEED_DOCUMENTS
        #[arg(long = "document")]
        documents: Vec<PathBuf>,
    },
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Settings::load_from_file(path).map_err(anyhow::Error::msg),
        None => Ok(Settings::new()),
    }
}

async fn seed(
    settings: &Settings,
    store: Arc<dyn GraphStore>,
    registry: &ProviderRegistry,
) -> anyhow::Result<()> {
    match run_seed(settings, store, registry).await.context("seeding failed")? {
        SeedOutcome::Statements { count } => info!("Applied {} seed statements", count),
        SeedOutcome::Documents(reports) => info!("Seeded {} document(s)", reports.len()),
    }
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("graphrag_backend=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_ref())?;
    let registry = ProviderRegistry::with_defaults();

    let command = cli.command.unwrap_or(Commands::Serve { addr: None });

    let store: Arc<dyn GraphStore> =
        Arc::new(connect_neo4j(&settings.neo4j, &settings.retry_policy()).await?);

    match command {
        Commands::Seed { mode, documents } => {
            if let Some(mode) = mode {
                settings.seed_mode = mode;
            }
            if !documents.is_empty() {
                settings.seed_documents = documents;
            }
            seed(&settings, store, &registry).await?;
        }
        Commands::Serve { addr } => {
            if settings.seed {
                seed(&settings, store.clone(), &registry).await?;
            }

            let state = Arc::new(
                AppState::from_settings(&settings, store, &registry)
                    .context("failed to configure query service")?,
            );
            let addr = addr.unwrap_or_else(|| settings.api_addr.clone());
            let listener = server::bind(&addr).await?;
            server::serve(listener, state, shutdown_signal()).await?;
        }
    }

    Ok(())
}
