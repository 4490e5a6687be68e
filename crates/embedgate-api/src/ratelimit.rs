//! # Fixed-Window Rate Limiter
//!
//! Counts requests per `subject:endpoint` in epoch-aligned windows. One
//! atomic increment per request; the request is admitted when the returned
//! count is within the limit.
//!
//! A bucket store error or timeout never blocks the request path for longer
//! than the configured timeout. By default the limiter fails open and marks
//! the decision degraded; with `fail_closed` it denies for one full window.

use std::sync::Arc;
use std::time::Duration;

use embedgate_core::{Clock, FixedWindow};

use crate::middleware::metrics::GatewayMetrics;
use crate::store::BucketStore;

/// Outcome of a limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Within quota, or the store was unreachable and the limiter failed open.
    Admitted {
        /// Post-increment count, 0 when degraded.
        count: u64,
        degraded: bool,
    },
    /// Over quota, or the store was unreachable and the limiter failed closed.
    Limited {
        /// Seconds until the next window.
        retry_after: u64,
        degraded: bool,
    },
}

impl RateDecision {
    /// Whether the bucket store could not be consulted.
    pub fn degraded(&self) -> bool {
        match self {
            Self::Admitted { degraded, .. } | Self::Limited { degraded, .. } => *degraded,
        }
    }
}

/// Rate limiter settings.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum admitted requests per window.
    pub limit: u64,
    pub window: FixedWindow,
    pub fail_closed: bool,
    /// Bound on a single bucket store call.
    pub timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 60,
            window: FixedWindow::default(),
            fail_closed: false,
            timeout: Duration::from_secs(2),
        }
    }
}

/// Shared limiter. Cheap to clone.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn Clock>,
    metrics: GatewayMetrics,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(
        config: RateLimitConfig,
        store: Arc<dyn BucketStore>,
        clock: Arc<dyn Clock>,
        metrics: GatewayMetrics,
    ) -> Self {
        Self {
            config,
            store,
            clock,
            metrics,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request from `subject` against `endpoint`.
    pub async fn check(&self, subject: &str, endpoint: &str) -> RateDecision {
        let bucket_key = format!("{subject}:{endpoint}");
        let slot = self.config.window.slot(self.clock.now_millis());

        let result = tokio::time::timeout(
            self.config.timeout,
            self.store.atomic_increment(&bucket_key, slot.start),
        )
        .await;

        match result {
            Ok(Ok(count)) if count <= self.config.limit => RateDecision::Admitted {
                count,
                degraded: false,
            },
            Ok(Ok(count)) => {
                tracing::info!(
                    bucket = %bucket_key,
                    count,
                    limit = self.config.limit,
                    retry_after = slot.retry_after,
                    "rate limit exceeded"
                );
                RateDecision::Limited {
                    retry_after: slot.retry_after,
                    degraded: false,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(bucket = %bucket_key, error = %e, "bucket store failed; limiter degraded");
                self.degraded()
            }
            Err(_) => {
                tracing::warn!(
                    bucket = %bucket_key,
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "bucket store timed out; limiter degraded"
                );
                self.degraded()
            }
        }
    }

    fn degraded(&self) -> RateDecision {
        self.metrics.limiter_degraded();
        if self.config.fail_closed {
            RateDecision::Limited {
                retry_after: self.config.window.size_secs(),
                degraded: true,
            }
        } else {
            RateDecision::Admitted {
                count: 0,
                degraded: true,
            }
        }
    }
}
