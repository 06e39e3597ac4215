//! CCDI federation server
//!
//! Run with: cargo run -p ccdi-web

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ccdi_common::Settings;
use ccdi_db::{GraphSession, MemgraphSession, RetryExecutor, RetryPolicy};
use ccdi_query::{cache, Catalog, ServiceConfig, Services};
use ccdi_web::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::load().context("loading settings")?;
    info!(bind = %settings.server.bind, database = %settings.database.uri, "starting CCDI federation server");

    let catalog = Catalog::from_settings(&settings)?;
    let session = MemgraphSession::connect(&settings.database)
        .await
        .context("connecting to graph store")?;
    let graph: Arc<dyn GraphSession> =
        Arc::new(RetryExecutor::new(session, RetryPolicy::from(&settings.query)));
    let cache = cache::from_settings(&settings.cache);
    info!(enabled = settings.cache.enabled, capacity = settings.cache.max_capacity, "aggregate cache ready");

    let services = Services::new(graph, Arc::new(catalog), cache, ServiceConfig::from(&settings));
    let app = build_router(AppState::new(services));

    let listener = tokio::net::TcpListener::bind(&settings.server.bind)
        .await
        .with_context(|| format!("binding {}", settings.server.bind))?;
    info!(addr = %settings.server.bind, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
