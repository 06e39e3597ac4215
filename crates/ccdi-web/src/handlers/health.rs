//! Liveness endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub started_at: String,
    pub uptime_secs: i64,
}

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Json<Health> {
    let uptime = chrono::Utc::now() - state.started_at;
    Json(Health {
        status: "ok",
        started_at: state.started_at.to_rfc3339(),
        uptime_secs: uptime.num_seconds(),
    })
}
