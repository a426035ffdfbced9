//! Security telemetry monitor.
//!
//! [`SecurityMonitor`] buffers prompt access logs and security alerts in
//! memory, flushes them to the database in batches (on a 30-second timer or
//! when a buffer fills), and runs fixed-threshold threat heuristics on every
//! access. One instance per process, created at startup via
//! [`SecurityMonitor::start`] and passed explicitly to whoever needs it,
//! never an ambient global. The returned `Arc` is safe to clone into any
//! number of concurrent pipeline tasks.

pub mod retention;

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use arcana_db::models::{
    AccessType, AlertSeverity, AlertType, CreateAccessLog, CreateSecurityAlert,
    PromptAccessCount, SecurityAlert,
};
use arcana_db::repositories::{AccessLogRepo, SecurityAlertRepo};
use arcana_db::DbPool;

// ---------------------------------------------------------------------------
// Constants (fixed, not user-configurable)
// ---------------------------------------------------------------------------

/// Buffer capacity for both access logs and alerts; a full buffer flushes
/// synchronously.
pub const BUFFER_CAPACITY: usize = 100;

/// Interval of the periodic flush timer.
pub const FLUSH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

/// Failed accesses from one IP within [`FAILED_IP_WINDOW_MINUTES`] that
/// trigger a MULTIPLE_FAILED_ATTEMPTS alert.
pub const FAILED_IP_THRESHOLD: i64 = 5;
pub const FAILED_IP_WINDOW_MINUTES: i64 = 5;

/// Accesses by one user within [`USER_RATE_WINDOW_MINUTES`] that trigger a
/// SUSPICIOUS_PATTERN alert.
pub const USER_RATE_THRESHOLD: i64 = 20;
pub const USER_RATE_WINDOW_MINUTES: i64 = 1;

/// Access logs and alerts older than this are purged by the retention job.
pub const RETENTION_DAYS: i64 = 30;

/// How many recent alerts / top prompts the dashboard reports.
const DASHBOARD_ALERT_LIMIT: i64 = 20;
const DASHBOARD_TOP_PROMPTS: i64 = 5;

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Aggregated security picture for a trailing window.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SecurityDashboard {
    pub window_hours: i64,
    pub total_accesses: i64,
    pub failed_accesses: i64,
    pub distinct_users: i64,
    pub distinct_ips: i64,
    pub recent_alerts: Vec<SecurityAlert>,
    pub top_prompts: Vec<PromptAccessCount>,
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Buffered, heuristic-driven security telemetry sink.
pub struct SecurityMonitor {
    pool: DbPool,
    access_buffer: Mutex<Vec<CreateAccessLog>>,
    alert_buffer: Mutex<Vec<CreateSecurityAlert>>,
    cancel: CancellationToken,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl SecurityMonitor {
    /// Create the monitor and start its periodic flush timer.
    pub fn start(pool: DbPool) -> Arc<Self> {
        let monitor = Arc::new(Self {
            pool,
            access_buffer: Mutex::new(Vec::with_capacity(BUFFER_CAPACITY)),
            alert_buffer: Mutex::new(Vec::with_capacity(BUFFER_CAPACITY)),
            cancel: CancellationToken::new(),
            flush_task: Mutex::new(None),
        });

        let task = tokio::spawn(flush_loop(Arc::clone(&monitor)));
        // start() is the only writer of flush_task, so try_lock cannot fail.
        if let Ok(mut slot) = monitor.flush_task.try_lock() {
            *slot = Some(task);
        }
        monitor
    }

    /// Stop the flush timer and flush everything still buffered.
    pub async fn close(&self) {
        self.cancel.cancel();
        if let Some(task) = self.flush_task.lock().await.take() {
            let _ = task.await;
        }
        self.flush_access_logs().await;
        self.flush_alerts().await;
        tracing::info!("Security monitor closed");
    }

    /// Record one prompt access and evaluate the threat heuristics.
    ///
    /// Appends to the buffer (flushing synchronously when full), then runs
    /// the per-call heuristics before returning. Heuristic or flush failures
    /// are logged and never surface to the caller; telemetry must not block
    /// the request that produced it.
    pub async fn log_access(&self, entry: CreateAccessLog) {
        let full = {
            let mut buffer = self.access_buffer.lock().await;
            buffer.push(entry.clone());
            buffer.len() >= BUFFER_CAPACITY
        };
        if full {
            self.flush_access_logs().await;
        }

        self.analyze_threats(&entry).await;
    }

    /// Queue a security alert.
    ///
    /// CRITICAL alerts skip the buffer: they are written out immediately and
    /// mirrored to the operational log. Everything else follows the same
    /// buffer/flush policy as access logs.
    pub async fn raise_alert(&self, alert: CreateSecurityAlert) {
        if alert.severity == AlertSeverity::Critical {
            tracing::error!(
                alert_type = alert.alert_type.as_str(),
                user_id = alert.user_id.as_deref(),
                ip_address = alert.ip_address.as_deref(),
                description = %alert.description,
                "CRITICAL security alert"
            );
            if let Err(e) =
                SecurityAlertRepo::insert_batch(&self.pool, std::slice::from_ref(&alert)).await
            {
                tracing::error!(error = %e, "Failed to persist critical alert, re-queueing");
                self.alert_buffer.lock().await.push(alert);
            }
            return;
        }

        let full = {
            let mut buffer = self.alert_buffer.lock().await;
            buffer.push(alert);
            buffer.len() >= BUFFER_CAPACITY
        };
        if full {
            self.flush_alerts().await;
        }
    }

    /// Aggregate the security picture for the trailing `window_hours`.
    ///
    /// Flushes both buffers first so the answer includes everything logged
    /// up to this call.
    pub async fn security_dashboard(
        &self,
        window_hours: i64,
    ) -> Result<SecurityDashboard, sqlx::Error> {
        self.flush_access_logs().await;
        self.flush_alerts().await;

        let since = Utc::now() - ChronoDuration::hours(window_hours);
        let stats = AccessLogRepo::window_stats(&self.pool, since).await?;
        let recent_alerts =
            SecurityAlertRepo::list_recent(&self.pool, since, DASHBOARD_ALERT_LIMIT).await?;
        let top_prompts =
            AccessLogRepo::top_prompts(&self.pool, since, DASHBOARD_TOP_PROMPTS).await?;

        Ok(SecurityDashboard {
            window_hours,
            total_accesses: stats.total_accesses,
            failed_accesses: stats.failed_accesses,
            distinct_users: stats.distinct_users,
            distinct_ips: stats.distinct_ips,
            recent_alerts,
            top_prompts,
        })
    }

    /// Delete access logs and alerts older than [`RETENTION_DAYS`].
    ///
    /// Idempotent; returns (purged logs, purged alerts).
    pub async fn cleanup_old_logs(&self) -> Result<(u64, u64), sqlx::Error> {
        let cutoff = Utc::now() - ChronoDuration::days(RETENTION_DAYS);
        let logs = AccessLogRepo::delete_older_than(&self.pool, cutoff).await?;
        let alerts = SecurityAlertRepo::delete_older_than(&self.pool, cutoff).await?;
        if logs > 0 || alerts > 0 {
            tracing::info!(logs, alerts, "Telemetry retention: purged old rows");
        }
        Ok((logs, alerts))
    }

    // -----------------------------------------------------------------------
    // Flushing
    // -----------------------------------------------------------------------

    /// Flush the access buffer. A failed insert re-queues the batch at the
    /// front of the buffer for the next attempt; data is never dropped.
    async fn flush_access_logs(&self) {
        let batch: Vec<CreateAccessLog> = {
            let mut buffer = self.access_buffer.lock().await;
            std::mem::take(&mut *buffer)
        };
        if batch.is_empty() {
            return;
        }

        match AccessLogRepo::insert_batch(&self.pool, &batch).await {
            Ok(flushed) => tracing::debug!(flushed, "Flushed access log batch"),
            Err(e) => {
                tracing::error!(error = %e, batch = batch.len(), "Access log flush failed, re-queueing");
                let mut buffer = self.access_buffer.lock().await;
                let newer = std::mem::replace(&mut *buffer, batch);
                buffer.extend(newer);
            }
        }
    }

    /// Flush the alert buffer with the same re-queue-on-failure policy.
    async fn flush_alerts(&self) {
        let batch: Vec<CreateSecurityAlert> = {
            let mut buffer = self.alert_buffer.lock().await;
            std::mem::take(&mut *buffer)
        };
        if batch.is_empty() {
            return;
        }

        match SecurityAlertRepo::insert_batch(&self.pool, &batch).await {
            Ok(flushed) => tracing::debug!(flushed, "Flushed alert batch"),
            Err(e) => {
                tracing::error!(error = %e, batch = batch.len(), "Alert flush failed, re-queueing");
                let mut buffer = self.alert_buffer.lock().await;
                let newer = std::mem::replace(&mut *buffer, batch);
                buffer.extend(newer);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Threat heuristics
    // -----------------------------------------------------------------------

    /// Run the fixed-threshold heuristics for one access entry.
    ///
    /// Counts combine already-flushed rows with whatever is still sitting in
    /// the buffer, so a burst inside one flush interval is not invisible.
    async fn analyze_threats(&self, entry: &CreateAccessLog) {
        if let Err(e) = self.try_analyze_threats(entry).await {
            tracing::error!(error = %e, prompt = %entry.prompt_name, "Threat analysis failed");
        }
    }

    async fn try_analyze_threats(&self, entry: &CreateAccessLog) -> Result<(), sqlx::Error> {
        // (a) repeated failures from one IP
        if !entry.success {
            if let Some(ip) = &entry.ip_address {
                let since = Utc::now() - ChronoDuration::minutes(FAILED_IP_WINDOW_MINUTES);
                let persisted =
                    AccessLogRepo::count_failed_from_ip(&self.pool, ip, since).await?;
                let buffered = {
                    let buffer = self.access_buffer.lock().await;
                    buffer
                        .iter()
                        .filter(|e| {
                            !e.success
                                && e.ip_address.as_deref() == Some(ip.as_str())
                                && e.created_at >= since
                        })
                        .count() as i64
                };
                if persisted + buffered >= FAILED_IP_THRESHOLD {
                    self.raise_alert(
                        CreateSecurityAlert::new(
                            AlertType::MultipleFailedAttempts,
                            AlertSeverity::High,
                            format!(
                                "{} failed prompt accesses from {ip} within {FAILED_IP_WINDOW_MINUTES} minutes",
                                persisted + buffered
                            ),
                        )
                        .with_ip(ip.clone()),
                    )
                    .await;
                }
            }
        }

        // (b) access rate per user
        if let Some(user_id) = &entry.user_id {
            let since = Utc::now() - ChronoDuration::minutes(USER_RATE_WINDOW_MINUTES);
            let persisted = AccessLogRepo::count_for_user(&self.pool, user_id, since).await?;
            let buffered = {
                let buffer = self.access_buffer.lock().await;
                buffer
                    .iter()
                    .filter(|e| {
                        e.user_id.as_deref() == Some(user_id.as_str()) && e.created_at >= since
                    })
                    .count() as i64
            };
            if persisted + buffered >= USER_RATE_THRESHOLD {
                let mut alert = CreateSecurityAlert::new(
                    AlertType::SuspiciousPattern,
                    AlertSeverity::Medium,
                    format!(
                        "User {user_id} made {} prompt accesses within {USER_RATE_WINDOW_MINUTES} minute(s)",
                        persisted + buffered
                    ),
                )
                .with_user(user_id.clone());
                if let Some(ip) = &entry.ip_address {
                    alert = alert.with_ip(ip.clone());
                }
                self.raise_alert(alert).await;
            }
        }

        // (c) any failed decrypt is an encryption failure
        if !entry.success && entry.access_type == AccessType::Decrypt {
            let mut alert = CreateSecurityAlert::new(
                AlertType::EncryptionFailure,
                AlertSeverity::High,
                format!("Decryption failed for prompt '{}'", entry.prompt_name),
            );
            if let Some(user_id) = &entry.user_id {
                alert = alert.with_user(user_id.clone());
            }
            if let Some(msg) = &entry.error_message {
                alert = alert.with_metadata(serde_json::json!({ "error": msg }));
            }
            self.raise_alert(alert).await;
        }

        Ok(())
    }

    #[doc(hidden)]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Periodic flush loop; exits when the monitor is closed.
async fn flush_loop(monitor: Arc<SecurityMonitor>) {
    let mut interval = tokio::time::interval(FLUSH_INTERVAL);
    interval.tick().await; // first tick fires immediately, skip it
    loop {
        tokio::select! {
            _ = monitor.cancel.cancelled() => break,
            _ = interval.tick() => {
                monitor.flush_access_logs().await;
                monitor.flush_alerts().await;
            }
        }
    }
}
