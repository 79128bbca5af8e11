//! TTL Sweep Task
//!
//! Background task that periodically removes expired entries from the
//! in-memory backend. The remote backend expires keys on its own; only the
//! memory store needs an active sweep, since lazy expiry alone would let
//! dead entries occupy capacity until their keys are next touched.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryBackend;

/// Spawns a background task that periodically sweeps expired entries.
///
/// Returns a JoinHandle so the caller can abort the task during graceful
/// shutdown.
pub fn spawn_sweep_task(memory: Arc<MemoryBackend>, sweep_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting TTL sweep task with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = memory.sweep_expired().await;

            if removed > 0 {
                info!("TTL sweep: removed {} expired entries", removed);
            } else {
                debug!("TTL sweep: no expired entries found");
            }
        }
    })
}
