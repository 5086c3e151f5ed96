//! Submission domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Lifecycle state of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Validated,
    Processed,
    Error,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Validated => "validated",
            SubmissionStatus::Processed => "processed",
            SubmissionStatus::Error => "error",
        }
    }

    /// Returns true for states no further transition leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Processed | SubmissionStatus::Error)
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SubmissionStatus::Pending),
            "validated" => Ok(SubmissionStatus::Validated),
            "processed" => Ok(SubmissionStatus::Processed),
            "error" => Ok(SubmissionStatus::Error),
            _ => Err(format!("Invalid submission status: {}", s)),
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One anonymous client's filled-out instance of a form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub form_id: Uuid,
    pub email: Option<String>,
    pub data: Map<String, Value>,
    pub status: SubmissionStatus,
    pub email_validated_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Public intake body.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFormRequest {
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,

    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFormResponse {
    pub submission_id: Uuid,
    pub status: SubmissionStatus,
    pub email_validation_required: bool,
}

/// Query for listing a form's submissions.
#[derive(Debug, Clone, Deserialize)]
pub struct ListSubmissionsQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSubmissionsResponse {
    pub submissions: Vec<Submission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Result of a propagation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagateResponse {
    pub submission_id: Uuid,
    pub status: SubmissionStatus,
    pub tables_written: usize,
}
