//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Every failure leaves the gateway as a flat `{ "error", "status" }` body.
//! Infrastructure failures use fixed text: callers never see internal
//! messages, identifiers they did not supply, or secrets.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Short, non-revealing description.
    pub error: String,
    /// HTTP status code, repeated for clients that only see the body.
    pub status: u16,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Missing or syntactically invalid request parameters (400).
    #[error("malformed request: {0}")]
    MalformedInput(&'static str),

    /// No active widget for the supplied site key (404).
    #[error("widget not found")]
    WidgetNotFound,

    /// The embedding origin is not on the widget's allow-list (403).
    #[error("origin not allowed")]
    OriginNotAllowed,

    /// Too many requests in the current window (429).
    #[error("rate limit exceeded")]
    RateLimited {
        /// Seconds until the next window opens.
        retry_after: u64,
    },

    /// The widget registry could not be consulted (503).
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedInput(_) => StatusCode::BAD_REQUEST,
            Self::WidgetNotFound => StatusCode::NOT_FOUND,
            Self::OriginNotAllowed => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::RegistryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::RegistryUnavailable(_) => "service unavailable".to_string(),
            Self::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::RegistryUnavailable(_) => tracing::warn!(error = %self, "registry unavailable"),
            _ => {}
        }

        let body = ErrorBody {
            error: self.public_message(),
            status: status.as_u16(),
        };

        let mut response = (status, Json(body)).into_response();
        if let Self::RateLimited { retry_after } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
