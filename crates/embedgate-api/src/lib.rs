//! # embedgate-api: Widget Bootstrap Gateway
//!
//! Axum service that decides whether a third-party page may embed a widget.
//!
//! ## Routes
//!
//! - `GET /widget/bootstrap`: admission decision, sanitized widget config
//! - `GET /openapi.json`: OpenAPI document
//! - `GET /health/liveness`, `GET /health/readiness`: Kubernetes probes
//! - `GET /metrics`: Prometheus exposition (when enabled)
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → MetricsMiddleware → route layers (Cache-Control, CORS)
//!
//! ## Pipeline
//!
//! Shape → [`ratelimit`] → [`registry`] → origin → ticket → [`audit`].
//! See [`gateway`] for the full decision table.
//!
//! ## Storage
//!
//! Registry, bucket store, and audit sink are traits with Postgres and
//! in-memory implementations; [`startup`] picks one set from configuration.

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod openapi;
pub mod ratelimit;
pub mod registry;
pub mod routes;
pub mod startup;
pub mod state;
pub mod store;

pub use config::GatewayConfig;
pub use error::AppError;
pub use state::AppState;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use middleware::metrics::GatewayMetrics;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let metrics_on = state.config.metrics_enabled;
    let metrics = state.metrics.clone();

    let mut api = Router::new()
        .merge(routes::bootstrap::router())
        .merge(openapi::router());

    if metrics_on {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(metrics.clone()));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let mut probes = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    if metrics_on {
        probes = probes
            .route("/metrics", axum::routing::get(prometheus_metrics))
            .layer(Extension(metrics));
    }

    let probes = probes.with_state(state);

    Router::new().merge(probes).merge(api)
}

async fn prometheus_metrics(Extension(metrics): Extension<GatewayMetrics>) -> impl IntoResponse {
    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

async fn liveness() -> &'static str {
    "ok"
}

async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = db::ping(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }
    (StatusCode::OK, "ready").into_response()
}
