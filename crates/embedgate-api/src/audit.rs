//! # Audit / Security Emitter
//!
//! Every admission decision appends exactly one [`AuditEvent`] to an
//! append-only, hash-chained log. Writes are attempted before the gateway
//! answers, bounded by a timeout, and never change the answer: a failed
//! write is logged and counted in `embedgate_audit_write_failures_total`.
//!
//! ## Chain
//!
//! Each stored event records `previous_hash` and
//! `event_hash = SHA-256(previous_hash ‖ JCS(event))`, anchored at the zero
//! hash. Sinks serialize appends so the chain stays linear: the in-memory
//! sink under a mutex, the Postgres sink under a transaction-scoped
//! advisory lock.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use embedgate_core::{CanonicalBytes, CanonicalizationError, Clock, ContentDigest, TenantId};
use embedgate_crypto::{chain_hash, verify_chain, ChainEntry, ChainIntegrity};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::metrics::GatewayMetrics;

/// Terminal action recorded for a bootstrap decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Config returned (anonymous or authenticated).
    BootstrapSuccess,
    /// Config returned anonymously; the ticket was malformed or forged.
    InvalidTicket,
    /// Config returned anonymously; the ticket was outside its window.
    TicketExpired,
    /// Denied: origin not on the allow-list.
    OriginMismatch,
    /// Denied: window quota exhausted.
    RateLimited,
    /// Denied: unknown or inactive site key.
    WidgetNotFound,
    /// Denied: missing or unparseable parameters.
    MalformedInput,
    /// Denied: registry failed or timed out.
    RegistryUnavailable,
}

impl AuditAction {
    /// Every action, in declaration order.
    pub const ALL: [AuditAction; 8] = [
        Self::BootstrapSuccess,
        Self::InvalidTicket,
        Self::TicketExpired,
        Self::OriginMismatch,
        Self::RateLimited,
        Self::WidgetNotFound,
        Self::MalformedInput,
        Self::RegistryUnavailable,
    ];

    /// Wire and storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BootstrapSuccess => "bootstrap_success",
            Self::InvalidTicket => "invalid_ticket",
            Self::TicketExpired => "ticket_expired",
            Self::OriginMismatch => "origin_mismatch",
            Self::RateLimited => "rate_limited",
            Self::WidgetNotFound => "widget_not_found",
            Self::MalformedInput => "malformed_input",
            Self::RegistryUnavailable => "registry_unavailable",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| AuditError::Corrupt(format!("unknown audit action: {s}")))
    }
}

/// A single admission decision, as written to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    /// `None` when the decision was made before a widget was resolved.
    pub tenant_id: Option<String>,
    pub actor: String,
    pub action: AuditAction,
    pub target: String,
    pub meta: Map<String, Value>,
    /// Millisecond precision, so the value survives a database round trip.
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    /// JCS bytes hashed into the chain.
    pub fn canonical_bytes(&self) -> Result<CanonicalBytes, CanonicalizationError> {
        CanonicalBytes::new(self)
    }
}

/// An event together with its position in the chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAuditEvent {
    pub sequence: i64,
    pub event: AuditEvent,
    pub previous_hash: String,
    pub event_hash: String,
}

impl StoredAuditEvent {
    /// Re-canonicalize for chain verification.
    pub fn to_chain_entry(&self) -> Result<ChainEntry, AuditError> {
        Ok(ChainEntry {
            sequence: self.sequence,
            previous_hash: self.previous_hash.clone(),
            event_hash: self.event_hash.clone(),
            payload: self.event.canonical_bytes()?,
        })
    }
}

/// Audit write and read errors. Never surfaced to bootstrap callers.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit event could not be canonicalized: {0}")]
    Canonicalization(#[from] CanonicalizationError),
    #[error("audit database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored audit data is corrupt: {0}")]
    Corrupt(String),
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Append-only destination for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    /// Link `event` onto the chain and persist it.
    async fn append(&self, event: &AuditEvent) -> Result<StoredAuditEvent, AuditError>;

    /// Read the whole chain in append order.
    async fn read_chain(&self) -> Result<Vec<StoredAuditEvent>, AuditError>;
}

/// Walk a sink's chain and report broken links.
pub async fn verify_sink(sink: &dyn AuditSink) -> Result<ChainIntegrity, AuditError> {
    let stored = sink.read_chain().await?;
    let entries = stored
        .iter()
        .map(StoredAuditEvent::to_chain_entry)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(verify_chain(&entries))
}

fn link(
    previous_hash: &str,
    sequence: i64,
    event: &AuditEvent,
) -> Result<StoredAuditEvent, AuditError> {
    let prev = ContentDigest::from_hex(previous_hash)
        .ok_or_else(|| AuditError::Corrupt(format!("chain head is not a digest: {previous_hash}")))?;
    let event_hash = chain_hash(&prev, &event.canonical_bytes()?);
    Ok(StoredAuditEvent {
        sequence,
        event: event.clone(),
        previous_hash: previous_hash.to_string(),
        event_hash: event_hash.to_hex(),
    })
}

// -- In-memory sink -----------------------------------------------------------

/// Hash-chained audit log held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<StoredAuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored events.
    pub fn events(&self) -> Vec<StoredAuditEvent> {
        self.events.lock().clone()
    }

    /// Actions in append order.
    pub fn actions(&self) -> Vec<AuditAction> {
        self.events.lock().iter().map(|e| e.event.action).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, event: &AuditEvent) -> Result<StoredAuditEvent, AuditError> {
        let mut events = self.events.lock();
        let head = events
            .last()
            .map(|e| e.event_hash.clone())
            .unwrap_or_else(|| ContentDigest::ZERO.to_hex());
        let sequence = events.len() as i64 + 1;
        let stored = link(&head, sequence, event)?;
        events.push(stored.clone());
        Ok(stored)
    }

    async fn read_chain(&self) -> Result<Vec<StoredAuditEvent>, AuditError> {
        Ok(self.events())
    }
}

// -- Postgres sink ------------------------------------------------------------

/// Audit log in the `audit_events` table.
#[derive(Debug, Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, event: &AuditEvent) -> Result<StoredAuditEvent, AuditError> {
        let mut tx = self.pool.begin().await?;
        crate::db::audit::lock_chain(&mut tx).await?;
        let head = crate::db::audit::head(&mut tx)
            .await?
            .unwrap_or_else(|| ContentDigest::ZERO.to_hex());
        // Sequence is assigned by the database; placeholder until insert.
        let linked = link(&head, 0, event)?;
        let sequence = crate::db::audit::insert(&mut tx, &linked).await?;
        tx.commit().await?;
        Ok(StoredAuditEvent { sequence, ..linked })
    }

    async fn read_chain(&self) -> Result<Vec<StoredAuditEvent>, AuditError> {
        crate::db::audit::load_all(&self.pool).await
    }
}

// -- Emitter ------------------------------------------------------------------

/// Builds events and writes them through a sink with a bounded wait.
#[derive(Clone)]
pub struct AuditEmitter {
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    metrics: GatewayMetrics,
}

impl std::fmt::Debug for AuditEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditEmitter")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AuditEmitter {
    pub fn new(
        sink: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
        metrics: GatewayMetrics,
    ) -> Self {
        Self {
            sink,
            clock,
            timeout,
            metrics,
        }
    }

    /// Record one decision. Returns whether the write succeeded; callers
    /// must not change their response based on it.
    pub async fn emit(
        &self,
        tenant_id: Option<&TenantId>,
        actor: &str,
        action: AuditAction,
        target: &str,
        meta: Map<String, Value>,
    ) -> bool {
        let now_ms = self.clock.now_millis();
        let created_at = DateTime::<Utc>::from_timestamp_millis(now_ms).unwrap_or_else(Utc::now);
        let event = AuditEvent {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.map(|t| t.to_string()),
            actor: actor.to_string(),
            action,
            target: target.to_string(),
            meta,
            created_at,
        };

        match tokio::time::timeout(self.timeout, self.sink.append(&event)).await {
            Ok(Ok(stored)) => {
                tracing::debug!(
                    action = %action,
                    sequence = stored.sequence,
                    event_hash = %stored.event_hash,
                    "audit event written"
                );
                true
            }
            Ok(Err(e)) => {
                self.metrics.audit_write_failed();
                tracing::error!(action = %action, error = %e, "audit write failed");
                false
            }
            Err(_) => {
                self.metrics.audit_write_failed();
                tracing::error!(
                    action = %action,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "audit write timed out"
                );
                false
            }
        }
    }
}
