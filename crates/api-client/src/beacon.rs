//! Fire-and-forget delivery for the final activity ping.

use tokio::task::JoinHandle;

use tableside_api::ActivitySource;

use crate::ApiClient;

impl ApiClient {
    /// Send one last activity update on a detached task.
    ///
    /// Returns immediately. The outcome is only logged; callers that are about
    /// to drop the runtime may await the handle with a deadline, but nothing
    /// depends on it finishing.
    pub fn send_beacon(&self, session_id: &str) -> JoinHandle<()> {
        let client = self.clone();
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            match client
                .record_activity(&session_id, ActivitySource::Unload)
                .await
            {
                Ok(ack) => tracing::debug!(
                    "Beacon delivered for session {session_id} (active={})",
                    ack.active
                ),
                Err(e) => tracing::warn!("Beacon for session {session_id} failed: {e}"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ApiClient;
    use crate::client::tests::serve;
    use std::time::Duration;

    #[tokio::test]
    async fn beacon_sends_unload_activity() {
        let (base, mut seen) =
            serve(200, r#"{"session_id":"s1","active":true,"last_activity_at":1}"#).await;
        let api = ApiClient::new(&base, Duration::from_secs(5)).unwrap();

        let handle = api.send_beacon("s1");
        drop(api);
        handle.await.unwrap();

        let request = seen.recv().await.unwrap();
        assert!(request.starts_with("POST /api/sessions/s1/activity"));
        assert!(request.contains(r#""kind":"unload""#));
    }

    #[tokio::test]
    async fn beacon_failure_is_swallowed() {
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        api.send_beacon("s1").await.unwrap();
    }
}
