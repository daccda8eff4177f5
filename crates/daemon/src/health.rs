use std::time::Duration;

use tableside_api_client::ApiClient;
use tracing::{debug, info, warn};

/// Periodically check that the server is reachable while tracking.
pub async fn run_health_check(
    api: ApiClient,
    interval_secs: u64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    if interval_secs == 0 {
        info!("Health checks disabled (interval_secs=0)");
        return;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    // Skip the first immediate tick
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => check_server(&api).await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("Health check shutting down");
                    break;
                }
            }
        }
    }
}

async fn check_server(api: &ApiClient) {
    match api.health().await {
        Ok(health) => debug!("Health check OK: server {} reachable", health.version),
        Err(e) => warn!("Health check: server issue ({e})"),
    }
}
