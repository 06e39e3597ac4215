//! Bounded retry with linear backoff and an overall time budget.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use ccdi_common::settings::QuerySettings;

use crate::error::{DbError, Result};
use crate::query::CypherQuery;
use crate::session::{GraphSession, Record};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub retries: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
    /// Budget for the whole call, retries and delays included.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&QuerySettings::default())
    }
}

impl From<&QuerySettings> for RetryPolicy {
    fn from(settings: &QuerySettings) -> Self {
        Self {
            retries: settings.retry_attempts,
            backoff: settings.retry_backoff(),
            timeout: settings.timeout(),
        }
    }
}

/// Wraps a session so that transient failures are retried.
///
/// Only `DbError::Connection` is retried. An empty result is a result.
pub struct RetryExecutor<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: GraphSession> RetryExecutor<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn run_with_retry(&self, query: &CypherQuery) -> Result<Vec<Record>> {
        let mut attempt = 0u32;
        loop {
            match self.inner.run(query).await {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_transient() && attempt < self.policy.retries => {
                    attempt += 1;
                    let delay = self.policy.backoff * attempt;
                    warn!(attempt, ?delay, error = %e, "transient graph error, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_transient() {
                        error!(attempts = attempt + 1, error = %e, "graph store unavailable");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl<S: GraphSession> GraphSession for RetryExecutor<S> {
    async fn run(&self, query: &CypherQuery) -> Result<Vec<Record>> {
        match tokio::time::timeout(self.policy.timeout, self.run_with_retry(query)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.policy.timeout, "query abandoned at time budget");
                Err(DbError::Timeout(self.policy.timeout))
            }
        }
    }
}
