//! Scheduled purge of aged telemetry.
//!
//! Spawned by the worker binary; runs [`SecurityMonitor::cleanup_old_logs`]
//! on a fixed interval using `tokio::time::interval` until cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::SecurityMonitor;

/// How often the retention job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Run the telemetry retention loop until `cancel` is triggered.
pub async fn run(monitor: Arc<SecurityMonitor>, cancel: CancellationToken) {
    tracing::info!(
        retention_days = crate::RETENTION_DAYS,
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Telemetry retention job started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Telemetry retention job stopping");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = monitor.cleanup_old_logs().await {
                    tracing::error!(error = %e, "Telemetry retention: cleanup failed");
                }
            }
        }
    }
}
