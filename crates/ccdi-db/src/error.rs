//! Graph store error types.

use std::time::Duration;

use ccdi_common::FederationError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// Transport or pool failure; safe to retry.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store rejected the query. Not retried.
    #[error("Query error: {0}")]
    Query(String),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl DbError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Connection(_))
    }
}

impl From<neo4rs::Error> for DbError {
    fn from(err: neo4rs::Error) -> Self {
        match err {
            neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError => {
                DbError::Connection(err.to_string())
            }
            neo4rs::Error::DeserializationError(_) => DbError::Decode(err.to_string()),
            other => DbError::Query(other.to_string()),
        }
    }
}

impl From<DbError> for FederationError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Connection(detail) => FederationError::DataUnavailable(detail),
            DbError::Timeout(budget) => FederationError::Timeout(budget),
            DbError::Query(detail) | DbError::Decode(detail) => FederationError::Database(detail),
        }
    }
}
