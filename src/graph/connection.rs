//! Connection establishment with retry.

use std::future::Future;

use tracing::info;

use super::{GraphStore, Neo4jStore};
use crate::config::Neo4jSettings;
use crate::retry::{retry_async, RetryPolicy};
use crate::Result;

/// Open a store and verify it with a round-trip query, retrying per `policy`.
///
/// A handle is only returned after `ping` succeeds on it.
pub async fn establish<S, F, Fut>(policy: &RetryPolicy, mut open: F) -> Result<S>
where
    S: GraphStore,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S>>,
{
    let store = retry_async(policy, "graph connection", || {
        let opening = open();
        async move {
            let store = opening.await?;
            store.ping().await?;
            Ok(store)
        }
    })
    .await?;

    info!("Connection is established.");
    Ok(store)
}

/// Connect to Neo4j, waiting for it to come up.
pub async fn connect_neo4j(settings: &Neo4jSettings, policy: &RetryPolicy) -> Result<Neo4jStore> {
    info!(uri = %settings.uri, user = %settings.user, "Connecting to Neo4j");
    establish(policy, || Neo4jStore::open(settings)).await
}
