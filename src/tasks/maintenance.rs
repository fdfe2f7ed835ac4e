//! Maintenance Task
//!
//! Background task that periodically runs the eviction policy outside of
//! any insertion, so expired artifacts are removed even when nothing new is
//! fetched.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::fetch::{CacheMode, FetchCoordinator};

/// Spawns a background task that periodically triggers eviction.
///
/// The task holds only a weak reference to the coordinator and exits on its
/// own once the coordinator is dropped. Passes are skipped while the
/// coordinator is in degraded mode.
///
/// # Arguments
/// * `coordinator` - The cache service to maintain
/// * `interval` - Time between passes
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort it.
pub fn spawn_maintenance_task(
    coordinator: Arc<FetchCoordinator>,
    interval: Duration,
) -> JoinHandle<()> {
    let coordinator = Arc::downgrade(&coordinator);

    tokio::spawn(async move {
        info!(
            "Starting cache maintenance task with interval of {} seconds",
            interval.as_secs_f64()
        );

        loop {
            tokio::time::sleep(interval).await;

            let Some(coordinator) = coordinator.upgrade() else {
                debug!("Cache coordinator dropped, stopping maintenance");
                return;
            };

            if coordinator.mode() == CacheMode::Degraded {
                debug!("Maintenance skipped: cache in pass-through mode");
                continue;
            }

            match coordinator.evict().await {
                Ok(report) if report.expired + report.evicted > 0 => info!(
                    "Maintenance: removed {} expired and {} oversize artifacts",
                    report.expired, report.evicted
                ),
                Ok(_) => debug!("Maintenance: nothing to remove"),
                Err(err) => warn!(error = %err, "Maintenance pass failed"),
            }
        }
    })
}
