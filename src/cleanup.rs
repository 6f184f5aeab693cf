//! Daily removal of expired ceremony sessions, authorization codes,
//! one-time tokens and old audit logs.

use crate::periodic::{self, PeriodicHandle};
use crate::store::{StoreResult, Stores};
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

pub const CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);
pub const AUDIT_LOG_RETENTION_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub sessions: u64,
    pub codes: u64,
    pub one_time_tokens: u64,
    pub audit_logs: u64,
}

/// # Errors
/// Returns the first store error; earlier deletions are kept.
pub async fn run_once(stores: &Stores, now: DateTime<Utc>) -> StoreResult<CleanupReport> {
    Ok(CleanupReport {
        sessions: stores.ceremonies.delete_expired_sessions(now).await?,
        codes: stores.codes.delete_expired_codes(now).await?,
        one_time_tokens: stores
            .one_time_tokens
            .delete_expired_one_time_tokens(now)
            .await?,
        audit_logs: stores
            .audit_logs
            .delete_audit_logs_before(now - Duration::days(AUDIT_LOG_RETENTION_DAYS))
            .await?,
    })
}

/// Start the job; the first run happens immediately.
#[must_use]
pub fn spawn(stores: Stores, interval: std::time::Duration) -> PeriodicHandle {
    periodic::spawn(interval, move || {
        let stores = stores.clone();
        async move {
            match run_once(&stores, Utc::now()).await {
                Ok(report) => info!(
                    sessions = report.sessions,
                    codes = report.codes,
                    one_time_tokens = report.one_time_tokens,
                    audit_logs = report.audit_logs,
                    "Cleanup finished"
                ),
                Err(err) => error!("Cleanup failed: {err}"),
            }
        }
    })
}
