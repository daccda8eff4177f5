use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::lifecycle;
use crate::storage::Db;

/// Periodically expire idle sessions until `shutdown` flips to true.
///
/// The first sweep runs immediately so sessions left over from a previous
/// process are cleaned up at startup.
pub async fn run_sweeper<C>(
    db: Db,
    timeout_secs: u64,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
    clock: C,
) where
    C: Fn() -> i64 + Send + 'static,
{
    let mut tick = tokio::time::interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Session sweeper started (every {}s, idle timeout {timeout_secs}s)",
        every.as_secs()
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let result = {
                    let mut conn = db.conn();
                    lifecycle::cleanup_idle(&mut conn, clock(), timeout_secs)
                };
                if let Err(e) = result {
                    error!("Idle session sweep failed: {}", e.message());
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Session sweeper stopped");
}
