//! # Application State
//!
//! Shared state handed to every Axum handler. Everything here is cheap to
//! clone: the gateway and metrics are `Arc`-backed, and the pool is a handle.

use std::sync::Arc;

use embedgate_core::{Clock, FixedWindow};
use sqlx::PgPool;

use crate::audit::{AuditEmitter, AuditSink};
use crate::config::GatewayConfig;
use crate::gateway::{BootstrapGateway, GatewaySettings};
use crate::middleware::metrics::GatewayMetrics;
use crate::ratelimit::{RateLimitConfig, RateLimiter};
use crate::registry::WidgetRegistry;
use crate::store::BucketStore;

/// The storage collaborators behind the gateway.
#[derive(Clone)]
pub struct GatewayParts {
    pub registry: Arc<dyn WidgetRegistry>,
    pub buckets: Arc<dyn BucketStore>,
    pub audit: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
}

/// Application state shared across all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub gateway: BootstrapGateway,
    pub metrics: GatewayMetrics,
    /// Set when running against Postgres; checked by the readiness probe.
    pub db_pool: Option<PgPool>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("gateway", &self.gateway)
            .field("db_pool", &self.db_pool.as_ref().map(|_| "[connected]"))
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the rate limiter, audit emitter, and gateway from `parts`.
    pub fn assemble(
        config: GatewayConfig,
        parts: GatewayParts,
        metrics: GatewayMetrics,
        db_pool: Option<PgPool>,
    ) -> Self {
        let limiter = RateLimiter::new(
            RateLimitConfig {
                limit: config.rate_limit,
                window: FixedWindow::new(config.rate_window_secs),
                fail_closed: config.rate_fail_closed,
                timeout: config.store_timeout,
            },
            parts.buckets,
            parts.clock.clone(),
            metrics.clone(),
        );
        let audit = AuditEmitter::new(
            parts.audit,
            parts.clock.clone(),
            config.store_timeout,
            metrics.clone(),
        );
        let gateway = BootstrapGateway::new(
            parts.registry,
            limiter,
            audit,
            parts.clock,
            GatewaySettings {
                ticket_max_age_secs: config.ticket_max_age_secs,
                registry_timeout: config.store_timeout,
            },
            metrics.clone(),
        );
        Self {
            config: Arc::new(config),
            gateway,
            metrics,
            db_pool,
        }
    }
}
