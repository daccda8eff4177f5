use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};

use tableside_api::{
    WEBHOOK_SIGNATURE_HEADER, WebhookAck, crypto, db, new_id, now_unix, service,
};

use crate::AppConfig;
use crate::error::ApiErr;
use crate::storage::{Db, sq_execute};

/// POST /api/webhooks/payment: payment gateway callback.
///
/// The signature covers the raw body, so the body is taken as bytes and only
/// parsed after verification. Redelivery of a known payment id is acknowledged
/// without recording it twice.
pub async fn payment_webhook(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiErr> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    if let Err(e) = crypto::verify_webhook_signature(&config.webhook_secret, &body, signature) {
        tracing::warn!("Rejected payment webhook: {}", e.message());
        return Err(e.into());
    }

    let hook = service::parse_payment_webhook(&body)?;

    let inserted = sq_execute(
        &db.conn(),
        db::payments::insert_ignore(&db::payments::InsertParams {
            id: &new_id(),
            provider_payment_id: &hook.payment_id,
            order_id: hook.order_id.as_deref(),
            session_id: hook.session_id.as_deref(),
            event: &hook.event,
            amount_minor: hook.amount,
            currency: &hook.currency,
            received_at: now_unix(),
        }),
    )
    .map_err(ApiErr::from_db("record payment event"))?;

    let duplicate = inserted == 0;
    if duplicate {
        tracing::info!("Duplicate payment webhook for {}", hook.payment_id);
    } else {
        tracing::info!(
            "Recorded {} for payment {} ({} {})",
            hook.event,
            hook.payment_id,
            hook.amount,
            hook.currency
        );
    }
    Ok(Json(WebhookAck {
        ok: true,
        duplicate,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    use crate::storage::temp_db;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] =
        br#"{"event":"payment.captured","payment_id":"pay_1","session_id":"s1","amount":1250,"currency":"krw"}"#;

    async fn deliver(
        db: &Db,
        secret: &str,
        signature: &str,
        body: &'static [u8],
    ) -> Result<Json<WebhookAck>, ApiErr> {
        let config = AppConfig {
            webhook_secret: secret.into(),
            ..AppConfig::default()
        };
        let mut headers = HeaderMap::new();
        headers.insert(
            WEBHOOK_SIGNATURE_HEADER,
            HeaderValue::from_str(signature).unwrap(),
        );
        payment_webhook(
            State(db.clone()),
            State(config),
            headers,
            Bytes::from_static(body),
        )
        .await
    }

    fn recorded(db: &Db) -> Vec<(String, String)> {
        let conn = db.conn();
        let mut stmt = conn
            .prepare("SELECT provider_payment_id, currency FROM payment_events")
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap()
    }

    #[tokio::test]
    async fn verified_payment_is_recorded_once() {
        let (_dir, db) = temp_db();
        let sig = crypto::sign_webhook(SECRET, BODY);

        let Json(first) = deliver(&db, SECRET, &sig, BODY).await.unwrap();
        assert!(first.ok);
        assert!(!first.duplicate);

        let Json(again) = deliver(&db, SECRET, &format!("sha256={sig}"), BODY)
            .await
            .unwrap();
        assert!(again.ok);
        assert!(again.duplicate);

        assert_eq!(recorded(&db), vec![("pay_1".to_string(), "KRW".to_string())]);
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_without_recording() {
        let (_dir, db) = temp_db();
        let sig = crypto::sign_webhook("someone-else", BODY);
        let err = deliver(&db, SECRET, &sig, BODY).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(recorded(&db).is_empty());
    }

    #[tokio::test]
    async fn unsigned_garbage_fails_verification_not_parsing() {
        let (_dir, db) = temp_db();
        let err = deliver(&db, SECRET, "deadbeef", b"{not json").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "invalid webhook signature");
    }

    #[tokio::test]
    async fn signed_but_malformed_payload_is_rejected() {
        let (_dir, db) = temp_db();
        let body: &[u8] = br#"{"event":"payment.captured","payment_id":" ","amount":1,"currency":"KRW"}"#;
        let sig = crypto::sign_webhook(SECRET, body);
        let err = deliver(&db, SECRET, &sig, body).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(recorded(&db).is_empty());
    }

    #[tokio::test]
    async fn missing_secret_rejects_every_webhook() {
        let (_dir, db) = temp_db();
        let sig = crypto::sign_webhook("", BODY);
        let err = deliver(&db, "", &sig, BODY).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(recorded(&db).is_empty());
    }
}
