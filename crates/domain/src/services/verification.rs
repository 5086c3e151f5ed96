//! Email verification rules: code expiry, resend checks and propagation eligibility.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::models::{EmailValidationMode, Submission, SubmissionStatus};

/// Default lifetime of a validation code.
pub const DEFAULT_CODE_TTL_MINUTES: i64 = 15;

/// Expiry of a code issued at `now`.
pub fn code_expires_at(now: DateTime<Utc>, ttl_minutes: i64) -> DateTime<Utc> {
    now + Duration::minutes(ttl_minutes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResendRejection {
    #[error("Email does not match the submission")]
    EmailMismatch,

    #[error("Email already validated")]
    AlreadyValidated,
}

/// A new code is issued only for the submission's own address, and only until it is verified.
pub fn check_resend(submission: &Submission, email: &str) -> Result<(), ResendRejection> {
    if submission.email.as_deref() != Some(email) {
        return Err(ResendRejection::EmailMismatch);
    }
    if submission.email_validated_at.is_some() {
        return Err(ResendRejection::AlreadyValidated);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IneligibleReason {
    #[error("Submission has already been processed")]
    AlreadyProcessed,

    #[error("Submission is in error state")]
    Failed,

    #[error("Email has not been verified yet")]
    AwaitingVerification,
}

/// Decides whether a submission's mapped values may be written to target tables.
///
/// Without verification a submission is eligible straight away. With `start`
/// or `end` propagation waits until the email is verified.
pub fn check_propagation_eligibility(
    mode: EmailValidationMode,
    status: SubmissionStatus,
    email_validated_at: Option<DateTime<Utc>>,
) -> Result<(), IneligibleReason> {
    match status {
        SubmissionStatus::Processed => return Err(IneligibleReason::AlreadyProcessed),
        SubmissionStatus::Error => return Err(IneligibleReason::Failed),
        SubmissionStatus::Pending | SubmissionStatus::Validated => {}
    }

    if mode.requires_verification()
        && (status != SubmissionStatus::Validated || email_validated_at.is_none())
    {
        return Err(IneligibleReason::AwaitingVerification);
    }
    Ok(())
}
