//! Shared API types, webhook crypto, and SQL builders for tableside.
//!
//! This crate is the **single source of truth** for all request/response types
//! exchanged between the server, the tracker daemon, and the typed client.

use serde::{Deserialize, Serialize};

#[cfg(feature = "backend")]
pub mod crypto;
#[cfg(feature = "backend")]
pub mod db;
pub mod deploy;
#[cfg(feature = "backend")]
pub mod service;

// Re-export core domain types for convenience
pub use tableside_core::{
    ActivitySource, Interaction, SessionStatus, SubscriptionStatus, TableStatus,
};

// ─── Utilities ───────────────────────────────────────────────────────────────

/// Current wall-clock time in unix seconds.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Generate a new opaque row id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Safely convert `u64` to `i64`, saturating at `i64::MAX` instead of wrapping.
pub fn saturating_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

// ─── Restaurants ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRestaurantRequest {
    pub name: String,
    #[serde(default)]
    pub subscription_status: Option<SubscriptionStatus>,
    /// Unix seconds; `None` means open-ended.
    #[serde(default)]
    pub subscription_expires_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantResponse {
    pub id: String,
    pub name: String,
    pub subscription_status: SubscriptionStatus,
    pub subscription_expires_at: Option<i64>,
    pub created_at: i64,
}

/// Returned by `GET /api/restaurants/{id}/subscription`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub restaurant_id: String,
    pub status: SubscriptionStatus,
    pub expires_at: Option<i64>,
    pub service_allowed: bool,
}

// ─── Dining tables ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTableRequest {
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResponse {
    pub id: String,
    pub restaurant_id: String,
    pub label: String,
    pub status: TableStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListTablesResponse {
    pub tables: Vec<TableResponse>,
}

/// Returned by both table and session release routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseResponse {
    pub table_id: String,
    pub table_status: TableStatus,
    /// The active session that was cancelled, if there was one.
    pub cancelled_session_id: Option<String>,
}

// ─── Table sessions ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionView {
    pub id: String,
    pub table_id: String,
    pub restaurant_id: String,
    pub status: SessionStatus,
    pub started_at: i64,
    pub last_activity_at: i64,
    pub ended_at: Option<i64>,
}

/// Returned by `POST /api/tables/{id}/sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session: SessionView,
    /// True when an existing active session was handed back.
    pub resumed: bool,
}

/// Body of `POST /api/sessions/{id}/activity`. An empty body is a heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRequest {
    #[serde(default = "default_activity_source")]
    pub source: ActivitySource,
}

impl Default for ActivityRequest {
    fn default() -> Self {
        Self {
            source: default_activity_source(),
        }
    }
}

fn default_activity_source() -> ActivitySource {
    ActivitySource::Heartbeat
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub session_id: String,
    /// False once the session has been released or expired.
    pub active: bool,
    pub last_activity_at: Option<i64>,
}

// ─── Cleanup RPC ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupRequest {
    /// Overrides the server's configured idle timeout for this run.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CleanupResponse {
    pub expired_sessions: Vec<String>,
    pub released_tables: Vec<String>,
    /// Sessions last active before this unix second were expired.
    pub cutoff: i64,
}

// ─── Payment webhook ─────────────────────────────────────────────────────────

/// Header carrying the hex HMAC-SHA256 of the raw webhook body.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Verified payment gateway event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentWebhook {
    pub event: String,
    pub payment_id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Amount in minor currency units.
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub ok: bool,
    /// True when this payment id had already been recorded.
    pub duplicate: bool,
}

// ─── Misc ────────────────────────────────────────────────────────────────────

/// Returned by `GET /api/health`: server liveness check.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ─── Service Error ───────────────────────────────────────────────────────────

/// Framework-agnostic service error.
///
/// Each variant maps to an HTTP status code; the server converts it into the
/// appropriate response type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServiceError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ServiceError {
    /// HTTP status code as a `u16`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Internal(m) => m,
        }
    }

    /// Build a closure that wraps a DB/IO error as `Internal`.
    pub fn from_db<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> Self + '_ {
        move |e| Self::Internal(format!("{context}: {e}"))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ServiceError {}

/// JSON error shape `{ "error": "..." }` returned by all error responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl From<&ServiceError> for ApiError {
    fn from(e: &ServiceError) -> Self {
        Self {
            error: e.message().to_string(),
        }
    }
}
