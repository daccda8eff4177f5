use axum::http::HeaderMap;
use tableside_api::deploy::ADMIN_KEY_HEADER;
use tableside_api::service;

use crate::AppConfig;
use crate::error::ApiErr;

/// Gate for provisioning routes: the request must carry the configured admin key.
pub fn require_admin(config: &AppConfig, headers: &HeaderMap) -> Result<(), ApiErr> {
    let provided = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    service::check_admin_key(&config.admin_key, provided)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn config(admin_key: &str) -> AppConfig {
        AppConfig {
            admin_key: admin_key.into(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn matching_key_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_KEY_HEADER, HeaderValue::from_static("s3cret"));
        assert!(require_admin(&config("s3cret"), &headers).is_ok());
    }

    #[test]
    fn missing_or_unconfigured_key_is_unauthorized() {
        let err = require_admin(&config("s3cret"), &HeaderMap::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_KEY_HEADER, HeaderValue::from_static(""));
        let err = require_admin(&config(""), &headers).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
