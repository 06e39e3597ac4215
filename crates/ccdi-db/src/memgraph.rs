//! Bolt-backed session for Memgraph (or Neo4j).

use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph};
use secrecy::ExposeSecret;
use tracing::{debug, info, instrument};

use ccdi_common::settings::DatabaseSettings;

use crate::error::{DbError, Result};
use crate::query::CypherQuery;
use crate::session::{GraphSession, Record};

/// Pooled connection to the graph store.
///
/// Cloning is cheap; the underlying pool is shared.
#[derive(Clone)]
pub struct MemgraphSession {
    graph: Graph,
}

impl MemgraphSession {
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let config = ConfigBuilder::default()
            .uri(settings.uri.as_str())
            .user(settings.user.as_str())
            .password(settings.password.expose_secret())
            .max_connections(settings.max_connections)
            .build()
            .map_err(DbError::from)?;
        let graph = Graph::connect(config).await?;
        info!(uri = %settings.uri, pool = settings.max_connections, "connected to graph store");
        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphSession for MemgraphSession {
    #[instrument(skip(self, query), fields(params = query.params.len()))]
    async fn run(&self, query: &CypherQuery) -> Result<Vec<Record>> {
        debug!(cypher = %query.text, "executing query");
        let mut stream = self.graph.execute(query.to_neo4rs()).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            let record: Record = row
                .to::<Record>()
                .map_err(|e| DbError::Decode(e.to_string()))?;
            rows.push(record);
        }
        debug!(rows = rows.len(), "query complete");
        Ok(rows)
    }
}
