//! Operator API rate limiting.
//!
//! Authenticated operator traffic gets a per-operator GCRA quota from
//! `governor`. Anonymous form traffic is limited separately by
//! [`crate::services::attempt_limiter`].

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovRateLimiter,
};
use serde_json::json;
use std::{
    collections::HashMap,
    num::NonZeroU32,
    sync::{Arc, RwLock},
};
use uuid::Uuid;

use crate::app::AppState;
use crate::middleware::metrics::record_rate_limit_denial;
use crate::middleware::user_auth::OperatorAuth;

type OperatorRateLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const FALLBACK_PER_MINUTE: NonZeroU32 = match NonZeroU32::new(100) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

/// Per-operator limiters shared across requests.
pub struct RateLimiterState {
    limiters: RwLock<HashMap<Uuid, Arc<OperatorRateLimiter>>>,
    rate_limit_per_minute: u32,
}

impl RateLimiterState {
    pub fn new(rate_limit_per_minute: u32) -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
            rate_limit_per_minute,
        }
    }

    fn get_or_create_limiter(&self, operator_id: Uuid) -> Arc<OperatorRateLimiter> {
        {
            let limiters = self.limiters.read().unwrap_or_else(|e| e.into_inner());
            if let Some(limiter) = limiters.get(&operator_id) {
                return limiter.clone();
            }
        }

        let mut limiters = self.limiters.write().unwrap_or_else(|e| e.into_inner());

        // Another request may have inserted it between the two locks
        if let Some(limiter) = limiters.get(&operator_id) {
            return limiter.clone();
        }

        let quota = Quota::per_minute(
            NonZeroU32::new(self.rate_limit_per_minute).unwrap_or(FALLBACK_PER_MINUTE),
        );
        let limiter = Arc::new(GovRateLimiter::direct(quota));
        limiters.insert(operator_id, limiter.clone());
        limiter
    }

    /// Returns `Err(retry_after_secs)` when the operator is over quota.
    pub fn check(&self, operator_id: Uuid) -> Result<(), u64> {
        let limiter = self.get_or_create_limiter(operator_id);

        match limiter.check() {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait_time = not_until.wait_time_from(DefaultClock::default().now());
                Err(wait_time.as_secs().max(1))
            }
        }
    }

    pub fn tracked_operators(&self) -> usize {
        self.limiters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("active_limiters", &self.tracked_operators())
            .finish()
    }
}

/// Applies the operator quota. Must run after `require_operator_auth`.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(operator_id) = req.extensions().get::<OperatorAuth>().map(|a| a.user_id) else {
        return next.run(req).await;
    };

    if let Some(ref rate_limiter) = state.rate_limiter {
        if let Err(retry_after) = rate_limiter.check(operator_id) {
            tracing::warn!(operator_id = %operator_id, retry_after, "Operator rate limit exceeded");
            record_rate_limit_denial("operator_api");
            return rate_limited_response(state.config.security.rate_limit_per_minute, retry_after);
        }
    }

    next.run(req).await
}

fn rate_limited_response(limit: u32, retry_after: u64) -> Response {
    let body = json!({
        "error": "rate_limited",
        "message": format!("Rate limit of {} requests/minute exceeded", limit),
        "retryAfter": retry_after
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_allows_first_request() {
        let state = RateLimiterState::new(100);
        assert!(state.check(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_rate_limiter_exhaustion() {
        let state = RateLimiterState::new(1);
        let operator = Uuid::new_v4();

        assert!(state.check(operator).is_ok());

        let result = state.check(operator);
        assert!(result.is_err());
        assert!(result.unwrap_err() >= 1);
    }

    #[test]
    fn test_rate_limiter_operators_are_independent() {
        let state = RateLimiterState::new(1);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(state.check(first).is_ok());
        assert!(state.check(first).is_err());
        assert!(state.check(second).is_ok());
    }

    #[test]
    fn test_rate_limiter_same_operator_multiple_checks() {
        let state = RateLimiterState::new(5);
        let operator = Uuid::new_v4();

        for i in 0..5 {
            assert!(state.check(operator).is_ok(), "Request {} should be allowed", i);
        }
        assert!(state.check(operator).is_err());
    }

    #[test]
    fn test_zero_limit_falls_back_to_default_quota() {
        let state = RateLimiterState::new(0);
        let operator = Uuid::new_v4();
        for _ in 0..10 {
            assert!(state.check(operator).is_ok());
        }
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let state = RateLimiterState::new(100);
        let operator = Uuid::new_v4();

        let a = state.get_or_create_limiter(operator);
        let b = state.get_or_create_limiter(operator);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(state.tracked_operators(), 1);
    }

    #[test]
    fn test_rate_limiter_state_debug() {
        let state = RateLimiterState::new(100);
        state.check(Uuid::new_v4()).unwrap();

        let debug = format!("{:?}", state);
        assert!(debug.contains("RateLimiterState"));
        assert!(debug.contains("rate_limit_per_minute"));
        assert!(debug.contains("active_limiters"));
    }

    #[test]
    fn test_rate_limited_response_format() {
        let response = rate_limited_response(100, 60);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");
    }
}
