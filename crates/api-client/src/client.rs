use std::time::Duration;

use anyhow::{Result, bail};
use serde::Serialize;

use tableside_api::deploy::ADMIN_KEY_HEADER;
use tableside_api::*;

/// Typed HTTP client for the tableside server.
///
/// Cloning is cheap: the underlying `reqwest::Client` is reference counted,
/// which lets beacons carry their own handle into a detached task.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    admin_key: Option<String>,
}

impl ApiClient {
    /// Create a new client with the given base URL and timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_key: None,
        }
    }

    /// Key sent as `X-Tableside-Admin-Key` on provisioning calls.
    pub fn set_admin_key(&mut self, key: String) {
        self.admin_key = Some(key);
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn admin_key_or_bail(&self) -> Result<&str> {
        self.admin_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("admin key not set"))
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self.client.post(self.url(path)).json(body).send().await?;
        parse_response(resp).await
    }

    async fn post_empty<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.client.post(self.url(path)).send().await?;
        parse_response(resp).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.client.get(self.url(path)).send().await?;
        parse_response(resp).await
    }

    // ── Health ────────────────────────────────────────────────────────────

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_json("/health").await
    }

    // ── Provisioning (admin) ──────────────────────────────────────────────

    pub async fn create_restaurant(
        &self,
        req: &CreateRestaurantRequest,
    ) -> Result<RestaurantResponse> {
        let key = self.admin_key_or_bail()?;
        let resp = self
            .client
            .post(self.url("/restaurants"))
            .header(ADMIN_KEY_HEADER, key)
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn create_table(
        &self,
        restaurant_id: &str,
        req: &CreateTableRequest,
    ) -> Result<TableResponse> {
        let key = self.admin_key_or_bail()?;
        let resp = self
            .client
            .post(self.url(&format!("/restaurants/{restaurant_id}/tables")))
            .header(ADMIN_KEY_HEADER, key)
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    // ── Restaurants ───────────────────────────────────────────────────────

    pub async fn list_tables(&self, restaurant_id: &str) -> Result<ListTablesResponse> {
        self.get_json(&format!("/restaurants/{restaurant_id}/tables"))
            .await
    }

    pub async fn subscription(&self, restaurant_id: &str) -> Result<SubscriptionResponse> {
        self.get_json(&format!("/restaurants/{restaurant_id}/subscription"))
            .await
    }

    // ── Table sessions ────────────────────────────────────────────────────

    pub async fn start_session(&self, table_id: &str) -> Result<StartSessionResponse> {
        self.post_empty(&format!("/tables/{table_id}/sessions")).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionView> {
        self.get_json(&format!("/sessions/{session_id}")).await
    }

    pub async fn record_activity(
        &self,
        session_id: &str,
        source: ActivitySource,
    ) -> Result<ActivityResponse> {
        self.post_json(
            &format!("/sessions/{session_id}/activity"),
            &ActivityRequest { source },
        )
        .await
    }

    pub async fn release_session(&self, session_id: &str) -> Result<ReleaseResponse> {
        self.post_empty(&format!("/sessions/{session_id}/release"))
            .await
    }

    pub async fn release_table(&self, table_id: &str) -> Result<ReleaseResponse> {
        self.post_empty(&format!("/tables/{table_id}/release")).await
    }

    // ── RPC ───────────────────────────────────────────────────────────────

    pub async fn cleanup_expired_sessions(
        &self,
        timeout_secs: Option<u64>,
    ) -> Result<CleanupResponse> {
        self.post_json(
            "/rpc/cleanup_expired_sessions",
            &CleanupRequest { timeout_secs },
        )
        .await
    }
}

/// Parse an HTTP response: return the deserialized body on 2xx,
/// or an error containing the status and body text.
async fn parse_response<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("{status}: {body}");
    }
    Ok(resp.json().await?)
}
