//! Operator JWT authentication middleware.
//!
//! Operator tokens are minted by the identity service; this service only
//! verifies them against the configured public key.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::config::JwtAuthConfig;
use shared::jwt::{extract_user_id, JwtConfig};

/// Verified operator identity, stored in request extensions.
#[derive(Debug, Clone)]
pub struct OperatorAuth {
    /// Operator id from the JWT subject claim.
    pub user_id: Uuid,
    /// JWT ID (jti)
    pub jti: String,
}

impl OperatorAuth {
    /// Validates a bearer token and returns the operator it belongs to.
    pub fn validate(jwt_config: &JwtConfig, token: &str) -> Result<Self, String> {
        let claims = jwt_config
            .validate_access_token(token)
            .map_err(|e| format!("Invalid token: {}", e))?;

        let user_id =
            extract_user_id(&claims).map_err(|_| "Invalid operator id in token".to_string())?;

        Ok(OperatorAuth {
            user_id,
            jti: claims.jti,
        })
    }

    /// Builds the verifier from configuration.
    pub fn create_jwt_config(config: &JwtAuthConfig) -> Result<JwtConfig, String> {
        JwtConfig::with_leeway(
            &config.private_key,
            &config.public_key,
            config.access_token_expiry_secs,
            config.leeway_secs,
        )
        .map_err(|e| format!("Failed to initialize JWT config: {}", e))
    }
}

/// Returns the token from an `Authorization: Bearer <token>` header, if any.
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware that requires a valid operator token.
///
/// On success the [`OperatorAuth`] is inserted into request extensions for
/// downstream extractors and the operator rate limiter.
pub async fn require_operator_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = match bearer_token(req.headers()) {
        Some(token) => token.to_string(),
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let Some(jwt_config) = state.jwt.as_deref() else {
        tracing::error!("Operator authentication requested but JWT keys are not configured");
        return internal_error_response("Authentication service unavailable");
    };

    match OperatorAuth::validate(jwt_config, &token) {
        Ok(auth) => {
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!("JWT validation failed: {}", e);
            unauthorized_response("Invalid or expired token")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

fn internal_error_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "internal_error",
            "message": message
        })),
    )
        .into_response()
}
