//! Shared application state for the web server.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use ccdi_query::Services;

/// Shared state injected into every Axum handler.
pub struct AppState {
    pub services: Services,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self { services, started_at: Utc::now() }
    }
}

pub type SharedState = Arc<AppState>;
