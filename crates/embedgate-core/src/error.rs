//! # Error Hierarchy
//!
//! Structured error types for the gateway core, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Validation errors carry the offending input and the expected format so
//! that operators can diagnose a bad registry entry without guesswork.
//! Origin errors deliberately do not: they describe caller input and are
//! mapped to short, non-revealing responses at the API layer.

use thiserror::Error;

/// Top-level error type for the gateway core.
#[derive(Error, Debug)]
pub enum EmbedGateError {
    /// Canonicalization failure during digest computation.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Domain primitive or registration validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Caller-supplied origin was rejected.
    #[error("origin error: {0}")]
    Origin(#[from] OriginError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for domain newtypes and widget registrations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Site key is empty, too long, or contains non URL-safe characters.
    #[error("invalid site key: \"{0}\" (expected 1-128 characters from [A-Za-z0-9_-])")]
    InvalidSiteKey(String),

    /// Widget identifier is empty.
    #[error("widget id must not be empty")]
    EmptyWidgetId,

    /// Tenant identifier is empty.
    #[error("tenant id must not be empty")]
    EmptyTenantId,

    /// Widget secret is shorter than the minimum HMAC key length.
    #[error("widget secret must be at least {min} bytes, got {actual}")]
    SecretTooShort {
        /// Minimum accepted length in bytes.
        min: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// An active widget has no allowed origins.
    #[error("widget {0} is active but has no allowed origins")]
    EmptyAllowList(String),

    /// An allow-list entry is not an exact `scheme://host[:port]` origin.
    #[error("allow-list entry \"{entry}\" for widget {widget} is not an exact origin: {reason}")]
    InvalidAllowListEntry {
        /// Widget the entry belongs to.
        widget: String,
        /// The offending entry.
        entry: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Reasons a caller-supplied origin is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OriginError {
    /// The value is not an absolute URL with a tuple origin.
    #[error("origin is malformed")]
    Malformed,

    /// The value parses, but is not in the widget's allow-list.
    #[error("origin is not allowed: {reason}")]
    NotAllowed {
        /// Short classification of the mismatch, safe for audit metadata.
        reason: &'static str,
    },
}

impl OriginError {
    /// Machine-readable reason used in audit metadata.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed_origin",
            Self::NotAllowed { reason } => reason,
        }
    }
}
