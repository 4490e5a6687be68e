//! # embedgate-api: Binary Entry Point
//!
//! Starts the widget bootstrap gateway. Configuration comes from the
//! environment (see [`embedgate_api::config`]).

use std::net::SocketAddr;
use std::sync::Arc;

use embedgate_api::middleware::metrics::GatewayMetrics;
use embedgate_api::{AppState, GatewayConfig};
use embedgate_core::{Clock, FixedWindow, SystemClock};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(config = ?config, "starting embedgate-api");

    // Optional: absent means in-memory stores.
    let db_pool = embedgate_api::db::init_pool(config.database_url.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Database initialization failed: {e}");
            e
        })?;

    let port = config.port;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let parts = embedgate_api::startup::gateway_parts(&config, db_pool.as_ref(), clock.clone())
        .map_err(|e| {
            tracing::error!("Startup failed: {e}");
            e
        })?;

    let _pruner = embedgate_api::store::spawn_pruner(
        parts.buckets.clone(),
        FixedWindow::new(config.rate_window_secs),
        clock,
        config.bucket_prune_interval,
    );

    tracing::info!(
        backend = if db_pool.is_some() { "postgres" } else { "memory" },
        rate_limit = config.rate_limit,
        rate_window_secs = config.rate_window_secs,
        rate_fail_closed = config.rate_fail_closed,
        ticket_max_age_secs = config.ticket_max_age_secs,
        "gateway configured"
    );
    let state = AppState::assemble(config, parts, GatewayMetrics::new(), db_pool);

    let app = embedgate_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("embedgate-api listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
