//! Payment webhook signatures.
//!
//! The gateway signs the raw request body with HMAC-SHA256 using a shared
//! secret and sends the hex digest in [`crate::WEBHOOK_SIGNATURE_HEADER`],
//! optionally prefixed with `sha256=`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign_webhook(secret: &str, body: &[u8]) -> String {
    hex::encode(mac_for(secret, body).finalize().into_bytes())
}

/// Verify a header-carried signature against the raw body.
///
/// Every failure is a `BadRequest`: a webhook that cannot be authenticated is
/// rejected, never logged-and-ignored.
pub fn verify_webhook_signature(
    secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), ServiceError> {
    if secret.is_empty() {
        return Err(ServiceError::BadRequest(
            "webhook secret not configured".into(),
        ));
    }

    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServiceError::BadRequest("missing webhook signature".into()))?;
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);

    let provided = hex::decode(signature)
        .map_err(|_| ServiceError::BadRequest("invalid webhook signature encoding".into()))?;

    // verify_slice compares in constant time
    mac_for(secret, body)
        .verify_slice(&provided)
        .map_err(|_| ServiceError::BadRequest("invalid webhook signature".into()))
}

/// Compare a shared secret in constant time. Both sides are MACed under a
/// fixed key first, so neither their contents nor their lengths leak.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    const COMPARE_KEY: &str = "tableside-secret-compare";
    let provided = mac_for(COMPARE_KEY, provided.as_bytes())
        .finalize()
        .into_bytes();
    mac_for(COMPARE_KEY, expected.as_bytes())
        .verify_slice(&provided)
        .is_ok()
}

fn mac_for(secret: &str, body: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    mac
}
