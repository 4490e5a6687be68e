//! Rate-limit bucket persistence.
//!
//! The increment is a single upsert, so concurrent requests against the same
//! bucket serialize on the row and every caller observes a distinct count.

use sqlx::PgPool;

/// Insert-or-increment the bucket and return the post-increment count.
pub async fn increment(pool: &PgPool, bucket_key: &str, window_start: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO rate_limit_buckets (bucket_key, window_start, count)
         VALUES ($1, $2, 1)
         ON CONFLICT (bucket_key, window_start)
         DO UPDATE SET count = rate_limit_buckets.count + 1
         RETURNING count",
    )
    .bind(bucket_key)
    .bind(window_start)
    .fetch_one(pool)
    .await
}

/// Delete buckets whose window started before `window_start`.
pub async fn delete_before(pool: &PgPool, window_start: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM rate_limit_buckets WHERE window_start < $1")
        .bind(window_start)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
