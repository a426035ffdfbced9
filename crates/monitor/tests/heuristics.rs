//! Integration tests for the security monitor's buffering and threat
//! heuristics, against a real database.

use chrono::{Duration, Utc};
use sqlx::PgPool;

use arcana_db::models::{AccessType, AlertSeverity, AlertType, CreateAccessLog, CreateSecurityAlert};
use arcana_db::repositories::SecurityAlertRepo;
use arcana_monitor::SecurityMonitor;

fn failed_read_from(ip: &str) -> CreateAccessLog {
    CreateAccessLog::new("questionFilter", AccessType::Read, false)
        .with_ip(ip)
        .with_error("prompt not found")
}

// ---------------------------------------------------------------------------
// Test: five failed accesses from one IP raise exactly one alert
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn five_failed_ip_accesses_raise_one_alert(pool: PgPool) {
    let monitor = SecurityMonitor::start(pool.clone());

    for _ in 0..5 {
        monitor.log_access(failed_read_from("10.0.0.9")).await;
    }

    // The dashboard flushes both buffers before answering.
    let dashboard = monitor.security_dashboard(1).await.unwrap();
    assert_eq!(dashboard.failed_accesses, 5);

    let since = Utc::now() - Duration::minutes(5);
    let alerts = SecurityAlertRepo::count_by_type(
        &pool,
        AlertType::MultipleFailedAttempts.as_str(),
        since,
    )
    .await
    .unwrap();
    assert_eq!(alerts, 1);

    let recent = SecurityAlertRepo::list_recent(&pool, since, 10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].severity, AlertSeverity::High.as_str());
    assert_eq!(recent[0].ip_address.as_deref(), Some("10.0.0.9"));

    monitor.close().await;
}

// ---------------------------------------------------------------------------
// Test: accesses past the threshold keep alerting without crashing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn sixth_failure_past_threshold_does_not_crash(pool: PgPool) {
    let monitor = SecurityMonitor::start(pool.clone());

    for _ in 0..6 {
        monitor.log_access(failed_read_from("10.0.0.9")).await;
    }
    monitor.close().await;

    let since = Utc::now() - Duration::minutes(5);
    let alerts = SecurityAlertRepo::count_by_type(
        &pool,
        AlertType::MultipleFailedAttempts.as_str(),
        since,
    )
    .await
    .unwrap();
    // One alert at the fifth failure and one at the sixth.
    assert_eq!(alerts, 2);
}

// ---------------------------------------------------------------------------
// Test: a failed decrypt raises an encryption failure alert
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn failed_decrypt_raises_encryption_failure(pool: PgPool) {
    let monitor = SecurityMonitor::start(pool.clone());

    monitor
        .log_access(
            CreateAccessLog::new("readingAgent", AccessType::Decrypt, false)
                .with_user("user-1")
                .with_error("authentication tag mismatch"),
        )
        .await;
    monitor.close().await;

    let since = Utc::now() - Duration::minutes(5);
    let recent = SecurityAlertRepo::list_recent(&pool, since, 10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].alert_type, AlertType::EncryptionFailure.as_str());
    assert_eq!(recent[0].severity, AlertSeverity::High.as_str());
    assert_eq!(recent[0].user_id.as_deref(), Some("user-1"));
}

// ---------------------------------------------------------------------------
// Test: a burst of accesses by one user raises a suspicious-pattern alert
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn user_burst_raises_suspicious_pattern(pool: PgPool) {
    let monitor = SecurityMonitor::start(pool.clone());

    for _ in 0..20 {
        monitor
            .log_access(
                CreateAccessLog::new("questionFilter", AccessType::Read, true).with_user("user-1"),
            )
            .await;
    }
    monitor.close().await;

    let since = Utc::now() - Duration::minutes(5);
    let alerts = SecurityAlertRepo::count_by_type(
        &pool,
        AlertType::SuspiciousPattern.as_str(),
        since,
    )
    .await
    .unwrap();
    assert_eq!(alerts, 1);
}

// ---------------------------------------------------------------------------
// Test: critical alerts skip the buffer entirely
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn critical_alert_bypasses_buffer(pool: PgPool) {
    let monitor = SecurityMonitor::start(pool.clone());

    monitor
        .raise_alert(CreateSecurityAlert::new(
            AlertType::UnauthorizedAccess,
            AlertSeverity::Critical,
            "master secret rejected at startup",
        ))
        .await;

    // Visible before any flush ran.
    let since = Utc::now() - Duration::minutes(5);
    let alerts = SecurityAlertRepo::count_by_type(
        &pool,
        AlertType::UnauthorizedAccess.as_str(),
        since,
    )
    .await
    .unwrap();
    assert_eq!(alerts, 1);

    monitor.close().await;
}

// ---------------------------------------------------------------------------
// Test: close flushes whatever is still buffered
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn close_flushes_buffered_telemetry(pool: PgPool) {
    let monitor = SecurityMonitor::start(pool.clone());

    monitor
        .log_access(CreateAccessLog::new("questionFilter", AccessType::Read, true))
        .await;
    monitor.close().await;

    let since = Utc::now() - Duration::minutes(5);
    let stats = arcana_db::repositories::AccessLogRepo::window_stats(&pool, since)
        .await
        .unwrap();
    assert_eq!(stats.total_accesses, 1);
}
