//! Rate-limit identity for anonymous form traffic.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;

use crate::app::AppState;
use crate::middleware::user_auth::{bearer_token, OperatorAuth};

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Shared bucket for callers that carry no identifying header.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Opaque key identifying the caller of a public endpoint.
///
/// Preference order: a verified bearer token (`user:<id>`), the first
/// `X-Forwarded-For` entry, `X-Real-IP`, then the shared `unknown` bucket.
/// An invalid token is ignored rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn address_from_headers(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get(REAL_IP)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded.or_else(real_ip).map(str::to_string)
}

fn identify(state: &AppState, parts: &Parts) -> String {
    if let Some(auth) = parts.extensions.get::<OperatorAuth>() {
        return format!("user:{}", auth.user_id);
    }

    if let (Some(token), Some(jwt)) = (bearer_token(&parts.headers), state.jwt.as_deref()) {
        if let Ok(auth) = OperatorAuth::validate(jwt, token) {
            return format!("user:{}", auth.user_id);
        }
    }

    address_from_headers(&parts.headers).unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for ClientIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIdentity(identify(state, parts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_first_forwarded_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR,
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert(REAL_IP, HeaderValue::from_static("198.51.100.2"));
        assert_eq!(
            address_from_headers(&headers).as_deref(),
            Some("203.0.113.7")
        );
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(REAL_IP, HeaderValue::from_static(" 198.51.100.2 "));
        assert_eq!(
            address_from_headers(&headers).as_deref(),
            Some("198.51.100.2")
        );
    }

    #[test]
    fn test_empty_forwarded_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static(" , 10.0.0.1"));
        headers.insert(REAL_IP, HeaderValue::from_static("198.51.100.2"));
        assert_eq!(
            address_from_headers(&headers).as_deref(),
            Some("198.51.100.2")
        );
    }

    #[test]
    fn test_no_headers_is_none() {
        assert_eq!(address_from_headers(&HeaderMap::new()), None);
    }
}
