//! Scheduled cleanup of expired refresh token records.

use crate::db::Database;
use crate::jwt::now_millis;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once. Returns the number of records removed.
pub async fn run_cleanup(db: &Database) -> u64 {
    match db.refresh_tokens().delete_expired(now_millis()).await {
        Ok(count) => {
            if count > 0 {
                info!(count, "Cleaned up expired refresh tokens");
            }
            count
        }
        Err(e) => {
            error!(error = %e, "Failed to clean up expired refresh tokens");
            0
        }
    }
}

/// Spawn a background task that runs cleanup periodically.
/// The first tick fires immediately, so this also covers the startup sweep.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}
