//! # Retention sweep.
//!
//! A timer task that periodically evicts terminal tasks whose completion age
//! exceeds their pool's retention. Active tasks are never evicted.
//!
//! ## Rules
//! - Holds only a `Weak` reference: the sweeper never keeps a dropped
//!   scheduler alive, and exits once the scheduler is gone.
//! - Missed ticks are skipped, not bunched.

use std::sync::Weak;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::scheduler::Scheduler;

/// Spawns the sweep loop. Called once from the builder.
pub(crate) fn spawn(scheduler: Weak<Scheduler>, token: CancellationToken) {
    let interval = match scheduler.upgrade() {
        Some(s) => s.config().sweep_interval,
        None => return,
    };

    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it so the first real
        // sweep happens one full interval after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(scheduler) = scheduler.upgrade() else { break };
                    let mut evicted = 0usize;
                    for pool in scheduler.pools_snapshot() {
                        evicted += pool.sweep().await;
                    }
                    if evicted > 0 {
                        debug!(evicted, "retention sweep evicted completed tasks");
                    }
                }
            }
        }
    });
}
