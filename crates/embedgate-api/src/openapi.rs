//! # OpenAPI Document Assembly
//!
//! Serves the utoipa-generated OpenAPI document at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// OpenAPI document for the public gateway surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Embed Gate: Widget Bootstrap API",
        version = "0.1.0",
        description = "Admission gateway for embeddable widgets.\n\nA third-party page calls `GET /widget/bootstrap` with its widget's public site key and its own origin. The gateway rate-limits the caller, resolves the widget, checks the origin against the widget's exact allow-list, optionally verifies an HMAC identity ticket, records an audit event, and returns sanitized widget configuration.\n\nUnauthenticated. Invalid tickets downgrade the response to anonymous rather than failing it.",
        license(name = "AGPL-3.0-or-later")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        crate::routes::bootstrap::bootstrap,
    ),
    components(schemas(
        crate::gateway::BootstrapResponse,
        crate::gateway::BootstrapUser,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "widget", description = "Widget embedding admission"),
    )
)]
pub struct ApiDoc;

/// Router serving the OpenAPI JSON document.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
