//! Background sweep that evicts finished rooms and purges dead sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::application::Registry;

/// Result of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rooms_evicted: usize,
    pub sessions_purged: usize,
}

/// Runs one sweep immediately.
pub async fn sweep(registry: &Registry, finished_ttl: Duration) -> SweepReport {
    SweepReport {
        rooms_evicted: registry.evict_finished(finished_ttl).await,
        sessions_purged: registry.purge_dead_sessions().await,
    }
}

/// Spawns the periodic sweep.  The task exits once `running` is cleared.
pub fn spawn_reaper(
    registry: Arc<Registry>,
    finished_ttl: Duration,
    every: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every.max(Duration::from_millis(10)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        while running.load(Ordering::Relaxed) {
            ticker.tick().await;
            let report = sweep(&registry, finished_ttl).await;
            if report != SweepReport::default() {
                debug!(?report, "reaper sweep");
            }
        }
    })
}
