//! Audit event persistence: an append-only hash chain.
//!
//! Appends run inside a transaction that first takes a transaction-scoped
//! advisory lock, so concurrent gateway replicas cannot both read the same
//! chain head and fork the chain. A trigger rejects UPDATE and DELETE.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::audit::{AuditError, AuditEvent, StoredAuditEvent};

/// Advisory lock key guarding the chain head.
pub const CHAIN_LOCK_KEY: i64 = 0x656d_6267_6175_6474;

/// Serialize appends for the lifetime of `tx`.
pub async fn lock_chain(tx: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(CHAIN_LOCK_KEY)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// `event_hash` of the most recent event, if any.
pub async fn head(tx: &mut Transaction<'_, Postgres>) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT event_hash FROM audit_events ORDER BY sequence DESC LIMIT 1")
        .fetch_optional(&mut **tx)
        .await
}

/// Insert a linked event and return its assigned sequence.
pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    stored: &StoredAuditEvent,
) -> Result<i64, sqlx::Error> {
    let event = &stored.event;
    sqlx::query_scalar(
        "INSERT INTO audit_events (id, tenant_id, actor, action, target, meta,
         previous_hash, event_hash, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING sequence",
    )
    .bind(event.id)
    .bind(&event.tenant_id)
    .bind(&event.actor)
    .bind(event.action.as_str())
    .bind(&event.target)
    .bind(serde_json::Value::Object(event.meta.clone()))
    .bind(&stored.previous_hash)
    .bind(&stored.event_hash)
    .bind(event.created_at)
    .fetch_one(&mut **tx)
    .await
}

/// Load the full chain in append order.
pub async fn load_all(pool: &PgPool) -> Result<Vec<StoredAuditEvent>, AuditError> {
    let rows = sqlx::query_as::<_, AuditEventRow>(
        "SELECT sequence, id, tenant_id, actor, action, target, meta,
         previous_hash, event_hash, created_at
         FROM audit_events ORDER BY sequence ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(AuditEventRow::into_stored).collect()
}

/// Database row for audit events.
#[derive(sqlx::FromRow)]
pub struct AuditEventRow {
    pub sequence: i64,
    pub id: Uuid,
    pub tenant_id: Option<String>,
    pub actor: String,
    pub action: String,
    pub target: String,
    pub meta: serde_json::Value,
    pub previous_hash: String,
    pub event_hash: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEventRow {
    fn into_stored(self) -> Result<StoredAuditEvent, AuditError> {
        let serde_json::Value::Object(meta) = self.meta else {
            return Err(AuditError::Corrupt(format!(
                "meta of event {} is not an object",
                self.sequence
            )));
        };
        Ok(StoredAuditEvent {
            sequence: self.sequence,
            event: AuditEvent {
                id: self.id,
                tenant_id: self.tenant_id,
                actor: self.actor,
                action: self.action.parse()?,
                target: self.target,
                meta,
                created_at: self.created_at,
            },
            previous_hash: self.previous_hash,
            event_hash: self.event_hash,
        })
    }
}
