// Identity resolution for incoming requests. The core only ever needs an
// authenticated user id; token verification lives behind this trait.

use axum::http::HeaderMap;

use crate::core::UserId;
use crate::error::{AppError, AppResult};

pub const USER_ID_HEADER: &str = "x-user-id";

pub trait IdentityProvider: Send + Sync {
    /// Resolve the authenticated user id for a request, or reject it.
    fn authenticate(&self, headers: &HeaderMap) -> AppResult<UserId>;
}

/// Trusted-header identity: the gateway in front of this service has already
/// verified the token and forwards the user id in `x-user-id`.
pub struct HeaderIdentity;

impl IdentityProvider for HeaderIdentity {
    fn authenticate(&self, headers: &HeaderMap) -> AppResult<UserId> {
        let raw = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing user identity".to_string()))?;
        raw.parse::<UserId>()
            .map_err(|_| AppError::Unauthorized("malformed user identity".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn resolves_header_identity() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("42"));
        assert_eq!(HeaderIdentity.authenticate(&headers).unwrap(), 42);
    }

    #[test]
    fn missing_or_malformed_identity_is_unauthorized() {
        let headers = HeaderMap::new();
        assert!(HeaderIdentity.authenticate(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-number"));
        assert!(HeaderIdentity.authenticate(&headers).is_err());
    }
}
