//! Background sweep of expired cache entries.
//!
//! Reads never return expired entries, so this only bounds memory.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::main_lib::AppState;

/// Starts the periodic cache cleanup; stops when the server shuts down.
pub fn start_cache_cleanup_scheduler(state: Arc<AppState>, every: Duration) {
    tokio::spawn(async move {
        info!("Cache cleanup scheduler started ({:?} interval)", every);

        let mut cleanup_interval = interval(every);
        cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick is immediate and the cache is empty at startup
        cleanup_interval.tick().await;

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => {
                    debug!("Cache cleanup scheduler stopped");
                    return;
                }
                _ = cleanup_interval.tick() => run_cleanup(&state),
            }
        }
    });
}

fn run_cleanup(state: &AppState) {
    let removed = state.market_data.cleanup_expired();
    if removed > 0 {
        info!("Evicted {} expired cache entries", removed);
    } else {
        debug!("Cache cleanup: nothing expired");
    }
}
