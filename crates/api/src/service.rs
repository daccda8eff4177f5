//! Shared business logic: framework-agnostic pure functions.
//!
//! Route handlers stay thin adapters: they load rows, call into here to
//! decide, then write the outcome.

use tableside_core::session::is_idle;

use crate::{PaymentWebhook, ServiceError, SessionView, SubscriptionStatus, crypto};

// ─── Validation ─────────────────────────────────────────────────────────────

/// Validate and normalize a restaurant name. Returns the trimmed name.
pub fn validate_restaurant_name(name: &str) -> Result<String, ServiceError> {
    let trimmed = name.trim().to_string();
    if trimmed.is_empty() || trimmed.chars().count() > 120 {
        return Err(ServiceError::BadRequest(
            "restaurant name must be 1-120 characters".into(),
        ));
    }
    Ok(trimmed)
}

/// Validate and normalize a table label (e.g. `A1`). Returns the trimmed label.
pub fn validate_table_label(label: &str) -> Result<String, ServiceError> {
    let trimmed = label.trim().to_string();
    if trimmed.is_empty() || trimmed.chars().count() > 32 {
        return Err(ServiceError::BadRequest(
            "table label must be 1-32 characters".into(),
        ));
    }
    Ok(trimmed)
}

/// Check the admin key header against the configured key.
/// An empty configured key disables admin routes entirely.
pub fn check_admin_key(configured: &str, provided: Option<&str>) -> Result<(), ServiceError> {
    let configured = configured.trim();
    let provided = provided.map(str::trim).unwrap_or("");
    if configured.is_empty() || !crypto::secrets_match(configured, provided) {
        return Err(ServiceError::Unauthorized("invalid admin key".into()));
    }
    Ok(())
}

// ─── Subscription gating ────────────────────────────────────────────────────

/// Reject new sessions for restaurants whose subscription does not allow service.
pub fn ensure_service_allowed(
    status: SubscriptionStatus,
    expires_at: Option<i64>,
    now_unix: i64,
) -> Result<(), ServiceError> {
    if status.allows_service(expires_at, now_unix) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "restaurant subscription is {status}; ordering is unavailable"
        )))
    }
}

// ─── Session start ──────────────────────────────────────────────────────────

/// What starting a session on a table should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartDecision {
    /// No active session: create one.
    Create,
    /// A live session exists: hand it back.
    Resume(SessionView),
    /// The active session is already idle: expire it, then create a new one.
    ReplaceIdle { idle: SessionView },
}

pub fn decide_start(existing: Option<SessionView>, now_unix: i64, timeout_secs: u64) -> StartDecision {
    match existing {
        None => StartDecision::Create,
        Some(session) if is_idle(session.last_activity_at, now_unix, timeout_secs) => {
            StartDecision::ReplaceIdle { idle: session }
        }
        Some(session) => StartDecision::Resume(session),
    }
}

// ─── Cleanup ────────────────────────────────────────────────────────────────

/// Pick the idle timeout for one cleanup run. A per-request override must be
/// non-zero; zero would expire every session including ones active right now.
pub fn resolve_cleanup_timeout(requested: Option<u64>, configured: u64) -> Result<u64, ServiceError> {
    match requested {
        Some(0) => Err(ServiceError::BadRequest(
            "timeout_secs must be greater than zero".into(),
        )),
        Some(secs) => Ok(secs),
        None => Ok(configured),
    }
}

// ─── Payment webhook ────────────────────────────────────────────────────────

/// Parse a webhook body that has already passed signature verification.
pub fn parse_payment_webhook(body: &[u8]) -> Result<PaymentWebhook, ServiceError> {
    let hook: PaymentWebhook = serde_json::from_slice(body)
        .map_err(|e| ServiceError::BadRequest(format!("invalid webhook payload: {e}")))?;

    if hook.payment_id.trim().is_empty() {
        return Err(ServiceError::BadRequest("payment_id is required".into()));
    }
    if hook.event.trim().is_empty() {
        return Err(ServiceError::BadRequest("event is required".into()));
    }
    if hook.amount < 0 {
        return Err(ServiceError::BadRequest("amount must not be negative".into()));
    }
    let currency_ok =
        hook.currency.len() == 3 && hook.currency.chars().all(|c| c.is_ascii_alphabetic());
    if !currency_ok {
        return Err(ServiceError::BadRequest(
            "currency must be a 3-letter ISO code".into(),
        ));
    }

    Ok(PaymentWebhook {
        currency: hook.currency.to_ascii_uppercase(),
        ..hook
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionStatus;

    fn session(last_activity_at: i64) -> SessionView {
        SessionView {
            id: "s1".into(),
            table_id: "t1".into(),
            restaurant_id: "r1".into(),
            status: SessionStatus::Active,
            started_at: 0,
            last_activity_at,
            ended_at: None,
        }
    }

    #[test]
    fn test_validate_table_label() {
        assert_eq!(validate_table_label("  A1 ").unwrap(), "A1");
        assert!(validate_table_label("").is_err());
        assert!(validate_table_label("   ").is_err());
        assert!(validate_table_label(&"x".repeat(33)).is_err());
        assert!(validate_table_label(&"x".repeat(32)).is_ok());
    }

    #[test]
    fn test_validate_restaurant_name() {
        assert_eq!(validate_restaurant_name(" Dosa Hut ").unwrap(), "Dosa Hut");
        assert!(validate_restaurant_name("").is_err());
        assert!(validate_restaurant_name(&"n".repeat(121)).is_err());
    }

    #[test]
    fn admin_key_must_be_configured_and_match() {
        assert!(check_admin_key("secret", Some("secret")).is_ok());
        assert!(check_admin_key("secret", Some(" secret ")).is_ok());
        assert!(check_admin_key("secret", Some("wrong")).is_err());
        assert!(check_admin_key("secret", Some("secret2")).is_err());
        assert!(check_admin_key("secret", Some("secre")).is_err());
        assert!(check_admin_key("secret", None).is_err());
        assert!(check_admin_key("", Some("")).is_err());
    }

    #[test]
    fn closed_subscription_is_forbidden() {
        assert!(ensure_service_allowed(SubscriptionStatus::Active, None, 10).is_ok());
        let err = ensure_service_allowed(SubscriptionStatus::Expired, None, 10).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert!(err.message().contains("expired"));
        assert!(ensure_service_allowed(SubscriptionStatus::Trial, Some(10), 10).is_err());
    }

    #[test]
    fn start_creates_resumes_or_replaces() {
        assert_eq!(decide_start(None, 1_000, 300), StartDecision::Create);
        assert_eq!(
            decide_start(Some(session(700)), 1_000, 300),
            StartDecision::Resume(session(700))
        );
        assert_eq!(
            decide_start(Some(session(699)), 1_000, 300),
            StartDecision::ReplaceIdle { idle: session(699) }
        );
    }

    #[test]
    fn cleanup_timeout_override_must_be_positive() {
        assert_eq!(resolve_cleanup_timeout(None, 300).unwrap(), 300);
        assert_eq!(resolve_cleanup_timeout(Some(60), 300).unwrap(), 60);
        assert!(resolve_cleanup_timeout(Some(0), 300).is_err());
    }

    #[test]
    fn webhook_payload_is_validated_and_normalized() {
        let hook = parse_payment_webhook(
            br#"{"event":"payment.captured","payment_id":"pay_1","session_id":"s1","amount":1250,"currency":"inr"}"#,
        )
        .unwrap();
        assert_eq!(hook.currency, "INR");
        assert_eq!(hook.session_id.as_deref(), Some("s1"));
        assert_eq!(hook.order_id, None);

        for body in [
            &br#"not json"#[..],
            br#"{"event":"x","payment_id":"","amount":1,"currency":"INR"}"#,
            br#"{"event":"","payment_id":"p","amount":1,"currency":"INR"}"#,
            br#"{"event":"x","payment_id":"p","amount":-1,"currency":"INR"}"#,
            br#"{"event":"x","payment_id":"p","amount":1,"currency":"RUPEE"}"#,
        ] {
            let err = parse_payment_webhook(body).unwrap_err();
            assert_eq!(err.status_code(), 400);
        }
    }
}
