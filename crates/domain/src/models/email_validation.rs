//! Email validation domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A time-boxed one-time code bound to a submission and an address.
///
/// Only the hash of the code is kept; the digits themselves exist only in
/// the message dispatched to the submitter.
#[derive(Debug, Clone)]
pub struct EmailValidation {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub email: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResendCodeRequest {
    pub submission_id: Uuid,

    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateEmailRequest {
    pub submission_id: Uuid,

    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,

    #[validate(custom(function = "shared::validation::validate_validation_code"))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendCodeResponse {
    pub sent: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateEmailResponse {
    pub submission_id: Uuid,
    pub status: super::submission::SubmissionStatus,
    pub email_validated_at: Option<DateTime<Utc>>,
}
