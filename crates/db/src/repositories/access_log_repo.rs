//! Repository for the append-only `prompt_access_logs` table.
//!
//! Inserts arrive in batches from the security monitor's buffer; the
//! remaining queries back the threat heuristics and the dashboard.

use sqlx::PgPool;
use arcana_core::types::Timestamp;

use crate::models::access_log::{AccessWindowStats, CreateAccessLog, PromptAccessCount};

/// Provides batch insert and aggregate queries for access logs.
pub struct AccessLogRepo;

impl AccessLogRepo {
    /// Insert a batch of buffered entries in one transaction.
    ///
    /// Entries carry their own `created_at` so buffering latency never
    /// shifts the recorded access time.
    pub async fn insert_batch(
        pool: &PgPool,
        entries: &[CreateAccessLog],
    ) -> Result<u64, sqlx::Error> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        for entry in entries {
            sqlx::query(
                "INSERT INTO prompt_access_logs
                    (prompt_name, access_type, user_id, ip_address, user_agent,
                     success, error_message, execution_time_ms, metadata, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(&entry.prompt_name)
            .bind(entry.access_type.as_str())
            .bind(&entry.user_id)
            .bind(&entry.ip_address)
            .bind(&entry.user_agent)
            .bind(entry.success)
            .bind(&entry.error_message)
            .bind(entry.execution_time_ms)
            .bind(&entry.metadata)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(entries.len() as u64)
    }

    /// Count failed accesses from one IP since a cutoff.
    pub async fn count_failed_from_ip(
        pool: &PgPool,
        ip_address: &str,
        since: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM prompt_access_logs
             WHERE ip_address = $1 AND success = false AND created_at >= $2",
        )
        .bind(ip_address)
        .bind(since)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Count all accesses by one user since a cutoff.
    pub async fn count_for_user(
        pool: &PgPool,
        user_id: &str,
        since: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM prompt_access_logs
             WHERE user_id = $1 AND created_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Dashboard totals for a window starting at `since`.
    pub async fn window_stats(
        pool: &PgPool,
        since: Timestamp,
    ) -> Result<AccessWindowStats, sqlx::Error> {
        sqlx::query_as::<_, AccessWindowStats>(
            "SELECT COUNT(*) AS total_accesses,
                    COUNT(*) FILTER (WHERE success = false) AS failed_accesses,
                    COUNT(DISTINCT user_id) AS distinct_users,
                    COUNT(DISTINCT ip_address) AS distinct_ips
             FROM prompt_access_logs
             WHERE created_at >= $1",
        )
        .bind(since)
        .fetch_one(pool)
        .await
    }

    /// Most-accessed prompt names within a window, busiest first.
    pub async fn top_prompts(
        pool: &PgPool,
        since: Timestamp,
        limit: i64,
    ) -> Result<Vec<PromptAccessCount>, sqlx::Error> {
        sqlx::query_as::<_, PromptAccessCount>(
            "SELECT prompt_name, COUNT(*) AS accesses
             FROM prompt_access_logs
             WHERE created_at >= $1
             GROUP BY prompt_name
             ORDER BY accesses DESC, prompt_name ASC
             LIMIT $2",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Purge entries older than the cutoff. Idempotent.
    pub async fn delete_older_than(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM prompt_access_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
