use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use domain::services::{
    ApplyError, FieldValidationError, IneligibleReason, MappingRuleError, PropagationError,
    ResendRejection, SqlRejection,
};
use persistence::repositories::PropagationStoreError;
use serde::Serialize;
use shared::pagination::CursorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limited with a caller-visible retry delay in seconds.
    #[error("Rate limited: {message}")]
    RateLimitedWithRetry { message: String, retry_after: u64 },

    /// Outbound delivery failed; the caller must know nothing was sent.
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let (status, error_code, message) = match &self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            ApiError::RateLimitedWithRetry {
                message,
                retry_after: secs,
            } => {
                retry_after = Some(*secs);
                (StatusCode::TOO_MANY_REQUESTS, "rate_limited", message.clone())
            }
            ApiError::DeliveryFailed(msg) => {
                tracing::error!("Delivery failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "delivery_failed",
                    "The validation code could not be sent. Please request a new code.".into(),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details: None,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => ApiError::Conflict("Resource already exists".into()),
                        "23503" => ApiError::NotFound("Referenced resource not found".into()),
                        _ => ApiError::Internal(format!("Database error: {}", db_err)),
                    }
                } else {
                    ApiError::Internal(format!("Database error: {}", db_err))
                }
            }
            _ => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field)),
                })
            })
            .collect();

        let message = match details.len() {
            0 => "Request failed validation".to_string(),
            1 => details[0].message.clone(),
            n => format!("{} validation errors", n),
        };

        ApiError::Validation(message)
    }
}

impl From<SqlRejection> for ApiError {
    fn from(err: SqlRejection) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<FieldValidationError> for ApiError {
    fn from(err: FieldValidationError) -> Self {
        ApiError::Validation(err.message)
    }
}

impl From<MappingRuleError> for ApiError {
    fn from(err: MappingRuleError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<ApplyError> for ApiError {
    fn from(err: ApplyError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<PropagationError> for ApiError {
    fn from(err: PropagationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<ResendRejection> for ApiError {
    fn from(err: ResendRejection) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<IneligibleReason> for ApiError {
    fn from(err: IneligibleReason) -> Self {
        ApiError::Conflict(err.to_string())
    }
}

impl From<CursorError> for ApiError {
    fn from(err: CursorError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<PropagationStoreError> for ApiError {
    fn from(err: PropagationStoreError) -> Self {
        match err {
            PropagationStoreError::NotEligible => {
                ApiError::Conflict("Submission is no longer eligible for propagation".into())
            }
            PropagationStoreError::Database(db_err) => db_err.into(),
            // Missing tables or columns and failing mapping queries are mapping mistakes.
            other => ApiError::Validation(other.to_string()),
        }
    }
}
