//! # Widget Registry
//!
//! Read-only lookup of [`WidgetRegistration`]s by site key. Three
//! implementations:
//!
//! - [`InMemoryRegistry`]: seeded from a YAML/JSON file, for development.
//! - [`PgRegistry`]: the `widgets` table.
//! - [`CachingRegistry`]: TTL cache in front of either, capped at
//!   [`MAX_CACHE_TTL`].
//!
//! Inactive widgets never resolve.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use embedgate_core::{Clock, SiteKey, ValidationError, WidgetRegistration};
use serde::Deserialize;
use sqlx::PgPool;

/// Upper bound on how stale a cached registration may be.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(60);

/// Default bound on [`CachingRegistry`] entries.
pub const MAX_CACHE_ENTRIES: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("registry unavailable: {0}")]
    Unavailable(String),
    #[error("invalid widget registration: {0}")]
    Invalid(#[from] ValidationError),
    #[error("duplicate {field} '{value}' in widget registry")]
    Duplicate { field: &'static str, value: String },
    #[error("cannot read widget file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse widget file {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Source of widget registrations.
#[async_trait]
pub trait WidgetRegistry: Send + Sync + 'static {
    /// The active registration for `site_key`, if any.
    async fn lookup(&self, site_key: &SiteKey) -> Result<Option<WidgetRegistration>, RegistryError>;
}

// -- In-memory ----------------------------------------------------------------

/// Registry held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    by_site_key: HashMap<String, WidgetRegistration>,
}

/// Layout of a widget seed file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedFile {
    widgets: Vec<WidgetRegistration>,
}

impl InMemoryRegistry {
    /// Build from registrations, validating each and rejecting duplicate
    /// site keys or widget ids.
    pub fn from_registrations(
        registrations: Vec<WidgetRegistration>,
    ) -> Result<Self, RegistryError> {
        let mut by_site_key = HashMap::with_capacity(registrations.len());
        let mut widget_ids = std::collections::HashSet::with_capacity(registrations.len());
        for reg in registrations {
            reg.validate()?;
            if !widget_ids.insert(reg.widget_id.to_string()) {
                return Err(RegistryError::Duplicate {
                    field: "widget_id",
                    value: reg.widget_id.to_string(),
                });
            }
            let key = reg.site_key.to_string();
            if by_site_key.contains_key(&key) {
                return Err(RegistryError::Duplicate {
                    field: "site_key",
                    value: key,
                });
            }
            by_site_key.insert(key, reg);
        }
        Ok(Self { by_site_key })
    }

    /// Load a seed file: JSON when the extension is `.json`, YAML otherwise.
    pub fn load_file(path: &Path) -> Result<Self, RegistryError> {
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: shown.clone(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let seed: SeedFile = if is_json {
            serde_json::from_str(&raw).map_err(|e| RegistryError::Parse {
                path: shown.clone(),
                reason: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(&raw).map_err(|e| RegistryError::Parse {
                path: shown.clone(),
                reason: e.to_string(),
            })?
        };
        let registry = Self::from_registrations(seed.widgets)?;
        tracing::info!(path = %shown, widgets = registry.len(), "loaded widget registry");
        Ok(registry)
    }

    /// Number of registrations, active or not.
    pub fn len(&self) -> usize {
        self.by_site_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_site_key.is_empty()
    }

    /// All registrations, ordered by site key.
    pub fn registrations(&self) -> Vec<&WidgetRegistration> {
        let mut regs: Vec<_> = self.by_site_key.values().collect();
        regs.sort_by(|a, b| a.site_key.as_str().cmp(b.site_key.as_str()));
        regs
    }
}

#[async_trait]
impl WidgetRegistry for InMemoryRegistry {
    async fn lookup(&self, site_key: &SiteKey) -> Result<Option<WidgetRegistration>, RegistryError> {
        Ok(self
            .by_site_key
            .get(site_key.as_str())
            .filter(|reg| reg.active)
            .cloned())
    }
}

// -- Postgres -----------------------------------------------------------------

/// Registry backed by the `widgets` table.
#[derive(Debug, Clone)]
pub struct PgRegistry {
    pool: PgPool,
}

impl PgRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WidgetRegistry for PgRegistry {
    async fn lookup(&self, site_key: &SiteKey) -> Result<Option<WidgetRegistration>, RegistryError> {
        let row = crate::db::widgets::find_active_by_site_key(&self.pool, site_key.as_str()).await?;
        match row {
            Some(row) => Ok(Some(row.into_registration()?)),
            None => Ok(None),
        }
    }
}

// -- Cache --------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CacheEntry {
    registration: Option<WidgetRegistration>,
    expires_at_ms: i64,
}

/// TTL cache over another registry. Misses are cached too, so an unknown
/// site key cannot be used to hammer the backing store. Errors are never
/// cached.
///
/// The map holds at most `max_entries` keys. Expired entries are swept once
/// per TTL, or as soon as the map is full; when it is still full after a
/// sweep, new results are served uncached.
pub struct CachingRegistry {
    inner: Arc<dyn WidgetRegistry>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
    max_entries: usize,
    next_sweep_ms: AtomicI64,
    entries: DashMap<String, CacheEntry>,
}

impl std::fmt::Debug for CachingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingRegistry")
            .field("ttl_ms", &self.ttl_ms)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl CachingRegistry {
    /// `ttl` is clamped to [`MAX_CACHE_TTL`].
    pub fn new(inner: Arc<dyn WidgetRegistry>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        let ttl = ttl.min(MAX_CACHE_TTL);
        Self {
            inner,
            clock,
            ttl_ms: ttl.as_millis() as i64,
            max_entries: MAX_CACHE_ENTRIES,
            next_sweep_ms: AtomicI64::new(i64::MIN),
            entries: DashMap::new(),
        }
    }

    /// Override the entry bound.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Number of cached keys, live or expired.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sweep(&self, now: i64) {
        let full = self.entries.len() >= self.max_entries;
        if !full && now < self.next_sweep_ms.load(Ordering::Relaxed) {
            return;
        }
        self.next_sweep_ms
            .store(now.saturating_add(self.ttl_ms), Ordering::Relaxed);
        self.entries.retain(|_, e| e.expires_at_ms > now);
    }
}

#[async_trait]
impl WidgetRegistry for CachingRegistry {
    async fn lookup(&self, site_key: &SiteKey) -> Result<Option<WidgetRegistration>, RegistryError> {
        let now = self.clock.now_millis();
        if let Some(entry) = self.entries.get(site_key.as_str()) {
            if entry.expires_at_ms > now {
                return Ok(entry.registration.clone());
            }
        }

        let registration = self.inner.lookup(site_key).await?;
        if self.ttl_ms > 0 {
            self.sweep(now);
            if self.entries.len() >= self.max_entries
                && !self.entries.contains_key(site_key.as_str())
            {
                return Ok(registration);
            }
            self.entries.insert(
                site_key.to_string(),
                CacheEntry {
                    registration: registration.clone(),
                    expires_at_ms: now.saturating_add(self.ttl_ms),
                },
            );
        }
        Ok(registration)
    }
}
