//! # Gateway Configuration
//!
//! Loaded once at startup from environment variables. Every value has a
//! default; a variable that is present but unparseable is an error rather
//! than a silent fallback, so a typo in a deployment manifest fails loudly.
//!
//! | Variable                        | Default |
//! |---------------------------------|---------|
//! | `PORT`                          | 8080    |
//! | `DATABASE_URL`                  | unset   |
//! | `EMBEDGATE_WIDGETS_FILE`        | unset   |
//! | `EMBEDGATE_RATE_LIMIT`          | 60      |
//! | `EMBEDGATE_RATE_WINDOW_SECS`    | 60      |
//! | `EMBEDGATE_RATE_FAIL_CLOSED`    | false   |
//! | `EMBEDGATE_TICKET_MAX_AGE_SECS` | 300     |
//! | `EMBEDGATE_STORE_TIMEOUT_MS`    | 2000    |
//! | `EMBEDGATE_REGISTRY_CACHE_SECS` | 30      |
//! | `EMBEDGATE_TRUST_FORWARDED_FOR` | false   |
//! | `EMBEDGATE_METRICS_ENABLED`     | true    |
//! | `EMBEDGATE_BUCKET_PRUNE_SECS`   | 300     |
//! | `EMBEDGATE_LOG_JSON`            | false   |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use embedgate_core::FixedWindow;

/// Upper bound on registry cache staleness.
pub const MAX_REGISTRY_CACHE_SECS: u64 = 60;

/// Upper bound on any single storage call.
pub const MAX_STORE_TIMEOUT_MS: u64 = 2_000;

/// Runtime configuration for the gateway.
///
/// Custom `Debug` implementation redacts the database URL, which usually
/// carries a password.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Listen port.
    pub port: u16,
    /// Postgres connection string. `None` selects in-memory stores.
    pub database_url: Option<String>,
    /// YAML or JSON widget seed file for the in-memory registry.
    pub widgets_file: Option<PathBuf>,
    /// Requests admitted per window per subject and endpoint.
    pub rate_limit: u64,
    /// Fixed window size in seconds.
    pub rate_window_secs: u64,
    /// Deny instead of admit when the bucket store fails.
    pub rate_fail_closed: bool,
    /// Ticket freshness window in seconds.
    pub ticket_max_age_secs: u64,
    /// Timeout for each registry, bucket, and audit call.
    pub store_timeout: Duration,
    /// Registry cache TTL. Zero disables caching.
    pub registry_cache_ttl: Duration,
    /// Take the subject from the first `X-Forwarded-For` entry.
    pub trust_forwarded_for: bool,
    /// Mount `/metrics` and record HTTP metrics.
    pub metrics_enabled: bool,
    /// Interval between stale bucket sweeps.
    pub bucket_prune_interval: Duration,
    /// Emit logs as JSON lines.
    pub log_json: bool,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("widgets_file", &self.widgets_file)
            .field("rate_limit", &self.rate_limit)
            .field("rate_window_secs", &self.rate_window_secs)
            .field("rate_fail_closed", &self.rate_fail_closed)
            .field("ticket_max_age_secs", &self.ticket_max_age_secs)
            .field("store_timeout", &self.store_timeout)
            .field("registry_cache_ttl", &self.registry_cache_ttl)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("bucket_prune_interval", &self.bucket_prune_interval)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            widgets_file: None,
            rate_limit: 60,
            rate_window_secs: 60,
            rate_fail_closed: false,
            ticket_max_age_secs: 300,
            store_timeout: Duration::from_millis(MAX_STORE_TIMEOUT_MS),
            registry_cache_ttl: Duration::from_secs(30),
            trust_forwarded_for: false,
            metrics_enabled: true,
            bucket_prune_interval: Duration::from_secs(300),
            log_json: false,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let rate_limit = parse_or(&get, "EMBEDGATE_RATE_LIMIT", defaults.rate_limit)?;
        if rate_limit == 0 {
            return Err(ConfigError::OutOfRange {
                var: "EMBEDGATE_RATE_LIMIT",
                reason: "must be at least 1",
            });
        }

        let rate_window_secs =
            parse_or(&get, "EMBEDGATE_RATE_WINDOW_SECS", defaults.rate_window_secs)?;
        if rate_window_secs == 0 || rate_window_secs > FixedWindow::MAX_SECS {
            return Err(ConfigError::OutOfRange {
                var: "EMBEDGATE_RATE_WINDOW_SECS",
                reason: "must be between 1 and 86400",
            });
        }

        let store_timeout_ms = parse_or(&get, "EMBEDGATE_STORE_TIMEOUT_MS", MAX_STORE_TIMEOUT_MS)?;
        if store_timeout_ms == 0 || store_timeout_ms > MAX_STORE_TIMEOUT_MS {
            return Err(ConfigError::OutOfRange {
                var: "EMBEDGATE_STORE_TIMEOUT_MS",
                reason: "must be between 1 and 2000",
            });
        }

        let cache_secs: u64 = parse_or(
            &get,
            "EMBEDGATE_REGISTRY_CACHE_SECS",
            defaults.registry_cache_ttl.as_secs(),
        )?;

        let prune_secs: u64 = parse_or(
            &get,
            "EMBEDGATE_BUCKET_PRUNE_SECS",
            defaults.bucket_prune_interval.as_secs(),
        )?;

        Ok(Self {
            port: parse_or(&get, "PORT", defaults.port)?,
            database_url: get("DATABASE_URL"),
            widgets_file: get("EMBEDGATE_WIDGETS_FILE").map(PathBuf::from),
            rate_limit,
            rate_window_secs,
            rate_fail_closed: bool_or(&get, "EMBEDGATE_RATE_FAIL_CLOSED", defaults.rate_fail_closed)?,
            ticket_max_age_secs: parse_or(
                &get,
                "EMBEDGATE_TICKET_MAX_AGE_SECS",
                defaults.ticket_max_age_secs,
            )?,
            store_timeout: Duration::from_millis(store_timeout_ms),
            registry_cache_ttl: Duration::from_secs(cache_secs.min(MAX_REGISTRY_CACHE_SECS)),
            trust_forwarded_for: bool_or(
                &get,
                "EMBEDGATE_TRUST_FORWARDED_FOR",
                defaults.trust_forwarded_for,
            )?,
            metrics_enabled: bool_or(&get, "EMBEDGATE_METRICS_ENABLED", defaults.metrics_enabled)?,
            bucket_prune_interval: Duration::from_secs(prune_secs.max(1)),
            log_json: bool_or(&get, "EMBEDGATE_LOG_JSON", defaults.log_json)?,
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            var,
            value: raw,
        }),
    }
}

fn bool_or<G>(get: &G, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { var, value: raw }),
        },
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got \"{value}\"")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} must be a boolean, got \"{value}\"")]
    InvalidBool { var: &'static str, value: String },
    #[error("{var} {reason}")]
    OutOfRange {
        var: &'static str,
        reason: &'static str,
    },
}
