//! Operator extractor for admin handlers.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::{bearer_token, OperatorAuth};

/// The authenticated operator making an admin request.
///
/// Reuses the identity inserted by `require_operator_auth` when the route is
/// behind it, otherwise verifies the bearer token itself.
#[derive(Debug, Clone)]
pub struct Operator {
    pub user_id: Uuid,
}

impl From<OperatorAuth> for Operator {
    fn from(auth: OperatorAuth) -> Self {
        Self {
            user_id: auth.user_id,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Operator {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<OperatorAuth>() {
            return Ok(auth.clone().into());
        }

        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let jwt = state
            .jwt
            .as_deref()
            .ok_or_else(|| ApiError::ServiceUnavailable("Authentication unavailable".to_string()))?;

        let auth = OperatorAuth::validate(jwt, token)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(auth.into())
    }
}
