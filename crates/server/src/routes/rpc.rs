use axum::{Json, body::Bytes, extract::State};

use tableside_api::{CleanupRequest, CleanupResponse, now_unix, service};

use crate::AppConfig;
use crate::error::ApiErr;
use crate::lifecycle;
use crate::storage::Db;

/// POST /api/rpc/cleanup_expired_sessions: expire idle sessions now.
///
/// Safe to call at any time and any number of times; the background sweeper
/// runs the same routine.
pub async fn cleanup_expired_sessions(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    body: Bytes,
) -> Result<Json<CleanupResponse>, ApiErr> {
    let req: CleanupRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CleanupRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiErr::bad_request(format!("invalid cleanup body: {e}")))?
    };
    let timeout_secs = service::resolve_cleanup_timeout(req.timeout_secs, config.session_timeout_secs)?;

    let report = lifecycle::cleanup_idle(&mut db.conn(), now_unix(), timeout_secs)?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    use crate::storage::temp_db;

    async fn cleanup(db: &Db, body: &'static [u8]) -> Result<Json<CleanupResponse>, ApiErr> {
        cleanup_expired_sessions(
            State(db.clone()),
            State(AppConfig::default()),
            Bytes::from_static(body),
        )
        .await
    }

    #[tokio::test]
    async fn empty_body_uses_configured_timeout() {
        let (_dir, db) = temp_db();
        let Json(report) = cleanup(&db, b"").await.unwrap();
        assert!(report.expired_sessions.is_empty());
        let Json(report) = cleanup(&db, b"{}").await.unwrap();
        assert!(report.released_tables.is_empty());
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected() {
        let (_dir, db) = temp_db();
        let err = cleanup(&db, br#"{"timeout_secs":0}"#).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (_dir, db) = temp_db();
        let err = cleanup(&db, b"{\"timeout_secs\":").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err = cleanup(&db, br#"{"timeout_secs":-5}"#).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
