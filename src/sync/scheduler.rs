use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::sync::SyncService;

/// Periodic full sync against the LMS.
pub struct SyncScheduler {
    sync: Arc<SyncService>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(sync: Arc<SyncService>, interval_secs: u64) -> Self {
        Self {
            sync,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Run the sync in an endless loop. Errors are logged and the loop
    /// continues; the next tick gets a fresh attempt.
    pub async fn start(self) {
        info!("starting auto-sync scheduler (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            match self.sync.sync_all().await {
                Ok(report) => {
                    info!(
                        "auto-sync completed - courses {}+{} lessons {}+{} students {}+{} ({} errors)",
                        report.courses.created,
                        report.courses.updated,
                        report.lessons.created,
                        report.lessons.updated,
                        report.students.created,
                        report.students.updated,
                        report.errors.len(),
                    );
                }
                Err(e) => {
                    tracing::warn!("auto-sync failed: {:?}", e);
                }
            }
        }
    }
}
