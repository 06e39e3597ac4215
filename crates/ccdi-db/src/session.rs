use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::query::CypherQuery;

/// One result row, keyed by the query's RETURN aliases.
pub type Record = Map<String, Value>;

/// Anything that can run a parameterized read query and hand back fully
/// consumed rows.
#[async_trait]
pub trait GraphSession: Send + Sync {
    async fn run(&self, query: &CypherQuery) -> Result<Vec<Record>>;
}

#[async_trait]
impl<T: GraphSession + ?Sized> GraphSession for std::sync::Arc<T> {
    async fn run(&self, query: &CypherQuery) -> Result<Vec<Record>> {
        (**self).run(query).await
    }
}
