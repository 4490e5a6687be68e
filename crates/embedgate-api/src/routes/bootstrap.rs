//! # Widget Bootstrap Route
//!
//! - `GET     /widget/bootstrap`: admit an embedding and return its config
//! - `OPTIONS /widget/bootstrap`: CORS preflight
//!
//! Every response carries `Cache-Control: private, max-age=60` and
//! permissive CORS headers, since the caller is a third-party page.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::error::AppError;
use crate::gateway::{BootstrapRequest, BootstrapResponse};
use crate::state::AppState;

/// Path of the bootstrap endpoint.
pub const BOOTSTRAP_PATH: &str = "/widget/bootstrap";

const CACHE_CONTROL_VALUE: &str = "private, max-age=60";

/// Assemble the bootstrap router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(BOOTSTRAP_PATH, get(bootstrap).options(preflight))
        .layer(cors())
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_VALUE),
        ))
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([header::RETRY_AFTER])
        .max_age(Duration::from_secs(600))
}

/// Raw query parameters. All optional so that missing values are reported
/// as a structured 400 by the gateway rather than an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct BootstrapQuery {
    pub site_key: Option<String>,
    pub origin: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: Option<String>,
    pub signature: Option<String>,
}

/// GET /widget/bootstrap: admit a widget embedding.
#[utoipa::path(
    get,
    path = "/widget/bootstrap",
    params(
        ("site_key" = String, Query, description = "Public widget key"),
        ("origin" = String, Query, description = "Origin of the embedding page"),
        ("user_id" = Option<String>, Query, description = "Claimed end-user id (ticket)"),
        ("timestamp" = Option<String>, Query, description = "Ticket issue time, epoch milliseconds"),
        ("signature" = Option<String>, Query, description = "Hex HMAC-SHA256 over user_id:timestamp")
    ),
    responses(
        (status = 200, description = "Sanitized widget configuration", body = BootstrapResponse),
        (status = 400, description = "Missing or malformed parameters", body = crate::error::ErrorBody),
        (status = 403, description = "Origin not allowed", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown or inactive site key", body = crate::error::ErrorBody),
        (status = 429, description = "Rate limit exceeded; see Retry-After", body = crate::error::ErrorBody),
        (status = 503, description = "Widget registry unavailable", body = crate::error::ErrorBody),
    ),
    tag = "widget"
)]
pub async fn bootstrap(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    query: Result<Query<BootstrapQuery>, QueryRejection>,
) -> Result<Json<BootstrapResponse>, AppError> {
    let (params, query_rejected) = match query {
        Ok(Query(params)) => (params, false),
        Err(e) => {
            tracing::debug!(error = %e, "unparseable bootstrap query");
            (BootstrapQuery::default(), true)
        }
    };
    let subject = subject(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        state.config.trust_forwarded_for,
    );
    let request = BootstrapRequest {
        site_key: params.site_key,
        origin: params.origin,
        user_id: params.user_id,
        timestamp: params.timestamp,
        signature: params.signature,
        subject,
        query_rejected,
    };

    // Decide on a detached task: if the client disconnects, the decision and
    // its audit write still run to completion.
    let gateway = state.gateway.clone();
    let response = tokio::spawn(async move { gateway.bootstrap(&request).await })
        .await
        .map_err(|e| AppError::Internal(format!("bootstrap task failed: {e}")))??;

    Ok(Json(response))
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Rate-limit subject: the first `X-Forwarded-For` hop when trusted, else
/// the peer address.
fn subject(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(client) = forwarded {
            return client.to_string();
        }
    }
    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}
