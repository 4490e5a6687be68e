//! # Bootstrap Gateway
//!
//! Orchestrates one admission decision for `GET /widget/bootstrap`:
//!
//! ```text
//! shape ─▶ rate limit ─▶ registry ─▶ origin ─▶ ticket ─▶ config
//!   │           │            │          │         │
//!  400         429       404 / 503     403    anonymous
//! ```
//!
//! Every decision, admitted or denied, emits exactly one audit event before
//! the response is produced. A ticket that fails verification downgrades the
//! response to anonymous; it never denies the request.

use std::sync::Arc;
use std::time::Duration;

use embedgate_core::{
    canonicalize, validate_origin, Clock, SiteKey, TenantId, WidgetRegistration,
};
use embedgate_crypto::{TicketOutcome, TicketParts, TicketVerifier};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::audit::{AuditAction, AuditEmitter};
use crate::error::AppError;
use crate::middleware::metrics::GatewayMetrics;
use crate::ratelimit::{RateDecision, RateLimiter};
use crate::registry::WidgetRegistry;

/// Endpoint name used in rate-limit bucket keys.
pub const BOOTSTRAP_ENDPOINT: &str = "widget_bootstrap";

const SUBJECT_MAX: usize = 64;
const USER_ID_MAX: usize = 64;
const ORIGIN_MAX: usize = 256;
const TARGET_MAX: usize = 128;

/// Raw bootstrap parameters plus the caller's subject identifier.
#[derive(Debug, Clone, Default)]
pub struct BootstrapRequest {
    pub site_key: Option<String>,
    pub origin: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: Option<String>,
    pub signature: Option<String>,
    /// Client address used for rate limiting and as the audit actor.
    pub subject: String,
    /// Set when the query string itself could not be decoded.
    pub query_rejected: bool,
}

/// Authenticated end user echoed back on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BootstrapUser {
    pub id: String,
}

/// Sanitized widget configuration returned to the embedding page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BootstrapResponse {
    /// Widget identifier.
    pub id: String,
    pub name: String,
    pub site_key: String,
    /// Opaque display configuration.
    #[schema(value_type = Object)]
    pub theme: Value,
    /// Present only when a fresh, correctly signed ticket was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<BootstrapUser>,
}

impl BootstrapResponse {
    fn new(registration: &WidgetRegistration, user: Option<BootstrapUser>) -> Self {
        let config = registration.to_config();
        Self {
            id: config.id,
            name: config.name,
            site_key: config.site_key,
            theme: config.theme,
            user,
        }
    }
}

/// Pipeline stage at which a decision was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Shape,
    RateLimit,
    Registry,
    Origin,
    Ticket,
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shape => "shape",
            Self::RateLimit => "rate_limit",
            Self::Registry => "registry",
            Self::Origin => "origin",
            Self::Ticket => "ticket",
            Self::Complete => "complete",
        }
    }
}

/// Gateway tunables not owned by a collaborator.
#[derive(Debug, Clone, Copy)]
pub struct GatewaySettings {
    pub ticket_max_age_secs: u64,
    /// Bound on a registry lookup.
    pub registry_timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            ticket_max_age_secs: TicketVerifier::DEFAULT_MAX_AGE_SECS,
            registry_timeout: Duration::from_secs(2),
        }
    }
}

/// The admission pipeline. Cheap to clone.
#[derive(Clone)]
pub struct BootstrapGateway {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Arc<dyn WidgetRegistry>,
    limiter: RateLimiter,
    audit: AuditEmitter,
    tickets: TicketVerifier,
    clock: Arc<dyn Clock>,
    registry_timeout: Duration,
    metrics: GatewayMetrics,
}

impl std::fmt::Debug for BootstrapGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapGateway")
            .field("limiter", &self.inner.limiter)
            .field("registry_timeout", &self.inner.registry_timeout)
            .finish_non_exhaustive()
    }
}

/// Everything the audit event needs about a finished decision.
struct Decision {
    action: AuditAction,
    stage: Stage,
    reason: &'static str,
    tenant: Option<TenantId>,
    target: String,
    ticket: &'static str,
    limiter_degraded: bool,
}

impl Decision {
    fn new(target: String) -> Self {
        Self {
            action: AuditAction::BootstrapSuccess,
            stage: Stage::Shape,
            reason: "ok",
            tenant: None,
            target,
            ticket: "absent",
            limiter_degraded: false,
        }
    }

    fn deny(
        &mut self,
        stage: Stage,
        action: AuditAction,
        reason: &'static str,
        error: AppError,
    ) -> Result<BootstrapResponse, AppError> {
        self.stage = stage;
        self.action = action;
        self.reason = reason;
        Err(error)
    }
}

impl BootstrapGateway {
    pub fn new(
        registry: Arc<dyn WidgetRegistry>,
        limiter: RateLimiter,
        audit: AuditEmitter,
        clock: Arc<dyn Clock>,
        settings: GatewaySettings,
        metrics: GatewayMetrics,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                limiter,
                audit,
                tickets: TicketVerifier::new(settings.ticket_max_age_secs),
                clock,
                registry_timeout: settings.registry_timeout,
                metrics,
            }),
        }
    }

    /// Decide one bootstrap request and record it.
    pub async fn bootstrap(&self, req: &BootstrapRequest) -> Result<BootstrapResponse, AppError> {
        let target = truncate(req.site_key.as_deref().unwrap_or(""), TARGET_MAX).to_string();
        let mut decision = Decision::new(target);
        let result = self.decide(req, &mut decision).await;

        let subject = truncate(&req.subject, SUBJECT_MAX);
        tracing::info!(
            site_key = %decision.target,
            subject = %subject,
            action = %decision.action,
            stage = decision.stage.as_str(),
            reason = decision.reason,
            "bootstrap decision"
        );

        let meta = self.meta(req, &decision);
        self.inner.metrics.record_outcome(decision.action.as_str());
        self.inner
            .audit
            .emit(
                decision.tenant.as_ref(),
                subject,
                decision.action,
                &decision.target,
                meta,
            )
            .await;

        result
    }

    async fn decide(
        &self,
        req: &BootstrapRequest,
        decision: &mut Decision,
    ) -> Result<BootstrapResponse, AppError> {
        // Shape
        if req.query_rejected {
            return decision.deny(
                Stage::Shape,
                AuditAction::MalformedInput,
                "malformed_query",
                AppError::MalformedInput("query string is malformed"),
            );
        }
        let site_key = match req.site_key.as_deref().filter(|s| !s.is_empty()) {
            None => {
                return decision.deny(
                    Stage::Shape,
                    AuditAction::MalformedInput,
                    "missing_site_key",
                    AppError::MalformedInput("site_key is required"),
                )
            }
            Some(raw) => match SiteKey::parse(raw) {
                Ok(key) => key,
                Err(_) => {
                    return decision.deny(
                        Stage::Shape,
                        AuditAction::MalformedInput,
                        "invalid_site_key",
                        AppError::MalformedInput("site_key is invalid"),
                    )
                }
            },
        };
        let raw_origin = match req.origin.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) if canonicalize(raw).is_ok() => raw,
            Some(_) => {
                return decision.deny(
                    Stage::Shape,
                    AuditAction::MalformedInput,
                    "malformed_origin",
                    AppError::MalformedInput("origin is not a valid URL"),
                )
            }
            None => {
                return decision.deny(
                    Stage::Shape,
                    AuditAction::MalformedInput,
                    "missing_origin",
                    AppError::MalformedInput("origin is required"),
                )
            }
        };

        // Rate limit
        let rate = self
            .inner
            .limiter
            .check(&req.subject, BOOTSTRAP_ENDPOINT)
            .await;
        decision.limiter_degraded = rate.degraded();
        if let RateDecision::Limited { retry_after, .. } = rate {
            return decision.deny(
                Stage::RateLimit,
                AuditAction::RateLimited,
                if rate.degraded() { "store_unavailable" } else { "quota_exhausted" },
                AppError::RateLimited { retry_after },
            );
        }

        // Registry
        let lookup =
            tokio::time::timeout(self.inner.registry_timeout, self.inner.registry.lookup(&site_key))
                .await;
        let registration = match lookup {
            Ok(Ok(Some(reg))) => reg,
            Ok(Ok(None)) => {
                return decision.deny(
                    Stage::Registry,
                    AuditAction::WidgetNotFound,
                    "unknown_site_key",
                    AppError::WidgetNotFound,
                )
            }
            Ok(Err(e)) => {
                tracing::warn!(site_key = %site_key, error = %e, "registry lookup failed");
                return decision.deny(
                    Stage::Registry,
                    AuditAction::RegistryUnavailable,
                    "registry_error",
                    AppError::RegistryUnavailable(e.to_string()),
                );
            }
            Err(_) => {
                tracing::warn!(
                    site_key = %site_key,
                    timeout_ms = self.inner.registry_timeout.as_millis() as u64,
                    "registry lookup timed out"
                );
                return decision.deny(
                    Stage::Registry,
                    AuditAction::RegistryUnavailable,
                    "registry_timeout",
                    AppError::RegistryUnavailable("lookup timed out".to_string()),
                );
            }
        };
        decision.tenant = Some(registration.tenant_id.clone());
        decision.target = registration.widget_id.to_string();

        // Origin
        if let Err(e) = validate_origin(raw_origin, &registration.allowed_origins) {
            return decision.deny(
                Stage::Origin,
                AuditAction::OriginMismatch,
                e.reason(),
                AppError::OriginNotAllowed,
            );
        }

        // Ticket
        let parts = TicketParts {
            user_id: req.user_id.as_deref(),
            timestamp: req.timestamp.as_deref(),
            signature: req.signature.as_deref(),
        };
        let outcome = self
            .inner
            .tickets
            .verify(&registration.secret, parts, self.inner.clock.now_millis());
        let user = match outcome {
            TicketOutcome::Absent => None,
            TicketOutcome::Verified { user_id } => {
                decision.ticket = "verified";
                Some(BootstrapUser { id: user_id })
            }
            TicketOutcome::Expired { skew_ms } => {
                tracing::debug!(site_key = %site_key, skew_ms, "ticket outside freshness window");
                decision.ticket = "expired";
                decision.stage = Stage::Ticket;
                decision.action = AuditAction::TicketExpired;
                decision.reason = "ticket_expired";
                None
            }
            TicketOutcome::Invalid(e) => {
                tracing::debug!(site_key = %site_key, reason = e.reason(), "ticket rejected");
                decision.ticket = "invalid";
                decision.stage = Stage::Ticket;
                decision.action = AuditAction::InvalidTicket;
                decision.reason = e.reason();
                None
            }
        };
        if decision.action == AuditAction::BootstrapSuccess {
            decision.stage = Stage::Complete;
        }

        Ok(BootstrapResponse::new(&registration, user))
    }

    fn meta(&self, req: &BootstrapRequest, decision: &Decision) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("stage".into(), decision.stage.as_str().into());
        meta.insert("reason".into(), decision.reason.into());
        meta.insert("subject".into(), truncate(&req.subject, SUBJECT_MAX).into());
        if let Some(origin) = req.origin.as_deref() {
            meta.insert("origin".into(), truncate(origin, ORIGIN_MAX).into());
        }
        meta.insert("ticket".into(), decision.ticket.into());
        if let Some(user_id) = req.user_id.as_deref().filter(|u| !u.is_empty()) {
            meta.insert("user_id".into(), truncate(user_id, USER_ID_MAX).into());
        }
        meta.insert("limiter_degraded".into(), decision.limiter_degraded.into());
        meta
    }
}

/// Longest prefix of `s` with at most `max` characters.
fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
