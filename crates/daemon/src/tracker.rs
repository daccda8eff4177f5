//! The table session activity tracker.
//!
//! One task keeps a session alive: a heartbeat on a fixed interval, an
//! activity update per customer interaction, both behind a shared throttle,
//! and a final beacon when the tracker is shut down.

use std::future::Future;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use tableside_api::ActivitySource;
use tableside_api_client::ApiClient;
use tableside_core::activity::{ActivityTimings, Interaction, Throttle};

/// Where activity updates go.
pub trait ActivitySink: Send + Sync {
    /// Deliver one update; resolves to whether the session is still active.
    fn record(
        &self,
        session_id: &str,
        source: ActivitySource,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Fire-and-forget final update. Must not block the caller.
    fn beacon(&self, session_id: &str) -> JoinHandle<()>;
}

impl ActivitySink for ApiClient {
    fn record(
        &self,
        session_id: &str,
        source: ActivitySource,
    ) -> impl Future<Output = Result<bool>> + Send {
        async move {
            let ack = self.record_activity(session_id, source).await?;
            Ok(ack.active)
        }
    }

    fn beacon(&self, session_id: &str) -> JoinHandle<()> {
        self.send_beacon(session_id)
    }
}

/// Why the tracker loop ended.
#[derive(Debug)]
pub enum TrackerExit {
    /// Shutdown was requested; the final beacon is in flight.
    Shutdown { beacon: JoinHandle<()> },
    /// The server reported the session released or expired.
    SessionEnded,
}

enum Delivery {
    Continue,
    SessionEnded,
}

async fn deliver<S: ActivitySink>(
    sink: &S,
    session_id: &str,
    throttle: &mut Throttle,
    source: ActivitySource,
) -> Delivery {
    if !throttle.admit(Instant::now().into_std()) {
        debug!("Throttled {source:?} for session {session_id}");
        return Delivery::Continue;
    }
    match sink.record(session_id, source).await {
        Ok(true) => Delivery::Continue,
        Ok(false) => Delivery::SessionEnded,
        Err(e) => {
            warn!("Activity update for session {session_id} failed: {e}");
            Delivery::Continue
        }
    }
}

/// Run the tracker until shutdown or until the session ends server-side.
///
/// A closed `interactions` channel only stops interaction intake; heartbeats
/// continue until `shutdown` flips to true.
pub async fn run_tracker<S: ActivitySink>(
    sink: &S,
    session_id: &str,
    timings: ActivityTimings,
    mut interactions: mpsc::Receiver<Interaction>,
    mut shutdown: watch::Receiver<bool>,
) -> TrackerExit {
    let mut throttle = Throttle::new(timings.throttle);
    let mut heartbeat = tokio::time::interval(timings.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut intake_open = true;

    info!(
        "Tracking session {session_id} (heartbeat {}s, throttle {}s)",
        timings.heartbeat_interval.as_secs(),
        timings.throttle.as_secs()
    );

    loop {
        let delivery = tokio::select! {
            _ = heartbeat.tick() => {
                deliver(sink, session_id, &mut throttle, ActivitySource::Heartbeat).await
            }
            received = interactions.recv(), if intake_open => match received {
                Some(interaction) => {
                    deliver(sink, session_id, &mut throttle, ActivitySource::Interaction(interaction)).await
                }
                None => {
                    debug!("Interaction intake closed");
                    intake_open = false;
                    Delivery::Continue
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                Delivery::Continue
            }
        };

        if let Delivery::SessionEnded = delivery {
            info!("Session {session_id} is no longer active; tracker stopping");
            return TrackerExit::SessionEnded;
        }
    }

    debug!("Sending final beacon for session {session_id}");
    TrackerExit::Shutdown {
        beacon: sink.beacon(session_id),
    }
}
