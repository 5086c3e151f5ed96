//! Public form endpoints used by the embeddable widget.
//!
//! Every handler charges the caller's attempt budget before touching storage.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::email_validation::{
    ResendCodeRequest, ResendCodeResponse, ValidateEmailRequest, ValidateEmailResponse,
};
use domain::models::form::PublicFormResponse;
use domain::models::submission::{SubmitFormRequest, SubmitFormResponse};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ClientIdentity;
use crate::services::attempt_limiter::LimitedOperation;
use crate::services::submission::SubmissionService;

/// Fetch an active form's public definition.
///
/// GET /api/v1/forms/:id
pub async fn get_public_form(
    State(state): State<AppState>,
    client: ClientIdentity,
    Path(widget_code): Path<String>,
) -> Result<Json<PublicFormResponse>, ApiError> {
    state
        .attempt_limiter
        .require(LimitedOperation::FormFetch, client.as_str())
        .await?;

    let form = SubmissionService::from_state(&state)
        .active_form(&widget_code)
        .await?;
    Ok(Json(form.into()))
}

/// Submit a form.
///
/// POST /api/v1/forms/:id/submit
pub async fn submit_form(
    State(state): State<AppState>,
    client: ClientIdentity,
    Path(widget_code): Path<String>,
    Json(request): Json<SubmitFormRequest>,
) -> Result<(StatusCode, Json<SubmitFormResponse>), ApiError> {
    state
        .attempt_limiter
        .require(LimitedOperation::Submit, client.as_str())
        .await?;
    request.validate()?;

    let response = SubmissionService::from_state(&state)
        .submit(&widget_code, request)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Send a new validation code for a pending submission.
///
/// POST /api/v1/forms/resend-code
pub async fn resend_code(
    State(state): State<AppState>,
    client: ClientIdentity,
    Json(request): Json<ResendCodeRequest>,
) -> Result<Json<ResendCodeResponse>, ApiError> {
    state
        .attempt_limiter
        .require(LimitedOperation::ResendCode, client.as_str())
        .await?;
    request.validate()?;

    let response = SubmissionService::from_state(&state)
        .resend_code(request)
        .await?;
    Ok(Json(response))
}

/// Verify a submission's email with a code.
///
/// POST /api/v1/forms/validate-email
pub async fn validate_email(
    State(state): State<AppState>,
    client: ClientIdentity,
    Json(request): Json<ValidateEmailRequest>,
) -> Result<Json<ValidateEmailResponse>, ApiError> {
    state
        .attempt_limiter
        .require(LimitedOperation::ValidateEmail, client.as_str())
        .await?;
    request.validate()?;

    let response = SubmissionService::from_state(&state)
        .verify_email(request)
        .await?;
    Ok(Json(response))
}
