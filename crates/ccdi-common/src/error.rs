use std::time::Duration;

use thiserror::Error;

use crate::entity::EntityType;

/// Where a field was used when it failed the allowlist check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUse {
    Filter,
    Count,
}

impl std::fmt::Display for FieldUse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldUse::Filter => f.write_str("filtering"),
            FieldUse::Count => f.write_str("count operations"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FederationError {
    #[error("Field '{field}' is not supported for {entity} {usage}")]
    UnsupportedField {
        entity: EntityType,
        field: String,
        usage: FieldUse,
    },

    #[error("Invalid parameters {parameters:?}: {reason}")]
    InvalidParameters {
        parameters: Vec<String>,
        reason: String,
    },

    #[error("{entity} not found: {identifier}")]
    NotFound {
        entity: EntityType,
        identifier: String,
    },

    /// Backend unreachable after retries. Details stay in the logs.
    #[error("No data available")]
    DataUnavailable(String),

    #[error("Query exceeded the {0:?} budget")]
    Timeout(Duration),

    #[error("Internal consistency violation: {0}")]
    InternalConsistency(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FederationError {
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        FederationError::InvalidParameters {
            parameters: vec![parameter.into()],
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FederationError>;
