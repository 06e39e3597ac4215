//! ccdi-test-utils — Fakes and fixtures shared by the workspace's tests.
//!
//! [`ScriptedSession`] stands in for the graph store: it records every
//! compiled query and answers with canned rows in the order they were
//! queued.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use ccdi_common::Settings;
use ccdi_db::{CypherQuery, DbError, GraphSession, Record};

pub use pretty_assertions;

// ── Scripted graph session ───────────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedSession {
    queries: Mutex<Vec<CypherQuery>>,
    responses: Mutex<VecDeque<Result<Vec<Record>, DbError>>>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn with_rows(self, rows: Vec<Record>) -> Self {
        self.push(Ok(rows));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, error: DbError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push(&self, response: Result<Vec<Record>, DbError>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Every query received so far, oldest first.
    pub fn queries(&self) -> Vec<CypherQuery> {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn last_query(&self) -> Option<CypherQuery> {
        self.queries().pop()
    }
}

#[async_trait]
impl GraphSession for ScriptedSession {
    /// Answers with the next queued response, or no rows once the script
    /// runs out.
    async fn run(&self, query: &CypherQuery) -> ccdi_db::Result<Vec<Record>> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ── Rows ─────────────────────────────────────────────────────────────────────

/// A result row from a JSON object literal.
///
/// # Panics
/// When `value` is not an object.
pub fn row(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("row fixture must be a JSON object, got {other}"),
    }
}

pub fn rows(values: impl IntoIterator<Item = Value>) -> Vec<Record> {
    values.into_iter().map(row).collect()
}

// ── Configuration fixtures ───────────────────────────────────────────────────

/// The workspace's `config_data` directory.
pub fn config_data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config_data")
}

/// Default settings pointed at the shipped mapping and file-type data.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.data.field_mappings = config_data_dir().join("field_mappings.json");
    settings.data.file_types = config_data_dir().join("file_types.json");
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let session = ScriptedSession::new()
            .with_rows(rows([json!({"id": "A"})]))
            .with_error(DbError::Connection("down".into()));
        let q = CypherQuery::new("RETURN 1");
        assert_eq!(session.run(&q).await.unwrap().len(), 1);
        assert!(session.run(&q).await.is_err());
        assert!(session.run(&q).await.unwrap().is_empty());
        assert_eq!(session.query_count(), 3);
    }

    #[test]
    fn test_settings_point_at_config_data() {
        assert!(test_settings().data.file_types.ends_with("file_types.json"));
    }
}
