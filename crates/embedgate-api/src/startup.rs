//! # Gateway Startup
//!
//! Chooses storage backends from configuration:
//!
//! 1. **Postgres** when a pool is available: widgets, buckets, and audit
//!    events all live in the database.
//! 2. **In-memory** otherwise: the registry is seeded from
//!    `EMBEDGATE_WIDGETS_FILE` (empty if unset), buckets and the audit
//!    chain live in process memory.
//!
//! Either registry is wrapped in a [`CachingRegistry`] when the cache TTL is
//! non-zero.

use std::sync::Arc;

use embedgate_core::Clock;
use sqlx::PgPool;

use crate::audit::{AuditSink, InMemoryAuditSink, PgAuditSink};
use crate::config::GatewayConfig;
use crate::registry::{CachingRegistry, InMemoryRegistry, PgRegistry, RegistryError, WidgetRegistry};
use crate::state::GatewayParts;
use crate::store::{BucketStore, InMemoryBucketStore, PgBucketStore};

/// Errors during gateway startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The widget seed file could not be loaded.
    #[error("widget registry: {0}")]
    Registry(#[from] RegistryError),
}

/// Select backends for `config`. `pool` is the result of
/// [`crate::db::init_pool`].
pub fn gateway_parts(
    config: &GatewayConfig,
    pool: Option<&PgPool>,
    clock: Arc<dyn Clock>,
) -> Result<GatewayParts, StartupError> {
    let (registry, buckets, audit): (
        Arc<dyn WidgetRegistry>,
        Arc<dyn BucketStore>,
        Arc<dyn AuditSink>,
    ) = match pool {
        Some(pool) => {
            if config.widgets_file.is_some() {
                tracing::warn!("EMBEDGATE_WIDGETS_FILE ignored: widgets are read from Postgres");
            }
            (
                Arc::new(PgRegistry::new(pool.clone())) as Arc<dyn WidgetRegistry>,
                Arc::new(PgBucketStore::new(pool.clone())) as Arc<dyn BucketStore>,
                Arc::new(PgAuditSink::new(pool.clone())) as Arc<dyn AuditSink>,
            )
        }
        None => {
            let registry = match &config.widgets_file {
                Some(path) => InMemoryRegistry::load_file(path)?,
                None => {
                    tracing::warn!(
                        "EMBEDGATE_WIDGETS_FILE not set; every site key will resolve as not found"
                    );
                    InMemoryRegistry::default()
                }
            };
            (
                Arc::new(registry) as Arc<dyn WidgetRegistry>,
                Arc::new(InMemoryBucketStore::new()) as Arc<dyn BucketStore>,
                Arc::new(InMemoryAuditSink::new()) as Arc<dyn AuditSink>,
            )
        }
    };

    let registry: Arc<dyn WidgetRegistry> = if config.registry_cache_ttl.is_zero() {
        registry
    } else {
        Arc::new(CachingRegistry::new(
            registry,
            clock.clone(),
            config.registry_cache_ttl,
        ))
    };

    Ok(GatewayParts {
        registry,
        buckets,
        audit,
        clock,
    })
}
