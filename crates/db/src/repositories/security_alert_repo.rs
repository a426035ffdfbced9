//! Repository for the `security_alerts` table.

use sqlx::PgPool;
use arcana_core::types::Timestamp;

use crate::models::security_alert::{CreateSecurityAlert, SecurityAlert};

/// Column list for security_alerts queries.
const COLUMNS: &str = "id, alert_type, severity, description, user_id, ip_address, \
    metadata, created_at";

/// Provides batch insert and read queries for security alerts.
pub struct SecurityAlertRepo;

impl SecurityAlertRepo {
    /// Insert a batch of buffered alerts in one transaction.
    pub async fn insert_batch(
        pool: &PgPool,
        alerts: &[CreateSecurityAlert],
    ) -> Result<u64, sqlx::Error> {
        if alerts.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        for alert in alerts {
            sqlx::query(
                "INSERT INTO security_alerts
                    (alert_type, severity, description, user_id, ip_address, metadata, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(alert.alert_type.as_str())
            .bind(alert.severity.as_str())
            .bind(&alert.description)
            .bind(&alert.user_id)
            .bind(&alert.ip_address)
            .bind(&alert.metadata)
            .bind(alert.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(alerts.len() as u64)
    }

    /// Most recent alerts within a window, newest first.
    pub async fn list_recent(
        pool: &PgPool,
        since: Timestamp,
        limit: i64,
    ) -> Result<Vec<SecurityAlert>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM security_alerts
             WHERE created_at >= $1
             ORDER BY created_at DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, SecurityAlert>(&query)
            .bind(since)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Count alerts of one type within a window.
    pub async fn count_by_type(
        pool: &PgPool,
        alert_type: &str,
        since: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM security_alerts
             WHERE alert_type = $1 AND created_at >= $2",
        )
        .bind(alert_type)
        .bind(since)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Purge alerts older than the cutoff. Idempotent.
    pub async fn delete_older_than(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM security_alerts WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
