//! # Database Persistence Layer
//!
//! Postgres persistence via SQLx for the three shared resources the gateway
//! touches: widget registrations (read-only), rate-limit buckets, and the
//! audit trail.
//!
//! The database layer is **optional**. When `DATABASE_URL` is unset the
//! gateway runs on in-memory stores, suitable for development and tests.

pub mod audit;
pub mod buckets;
pub mod widgets;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if no URL is configured (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!(
            "DATABASE_URL not set, running with in-memory stores. \
             Counters and audit events will not survive restarts."
        );
        return Ok(None);
    };

    let pool = connect(url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Open a pool without running migrations (operator tooling).
pub async fn connect(url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;
    tracing::info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Round-trip a trivial query; used by the readiness probe.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
