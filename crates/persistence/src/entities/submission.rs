//! Submission and email validation entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{EmailValidation, Submission, SubmissionStatus};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for submission_status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "submission_status", rename_all = "lowercase")]
pub enum SubmissionStatusDb {
    Pending,
    Validated,
    Processed,
    Error,
}

impl From<SubmissionStatusDb> for SubmissionStatus {
    fn from(db: SubmissionStatusDb) -> Self {
        match db {
            SubmissionStatusDb::Pending => SubmissionStatus::Pending,
            SubmissionStatusDb::Validated => SubmissionStatus::Validated,
            SubmissionStatusDb::Processed => SubmissionStatus::Processed,
            SubmissionStatusDb::Error => SubmissionStatus::Error,
        }
    }
}

/// Database row mapping for the form_submissions table.
#[derive(Debug, Clone, FromRow)]
pub struct SubmissionEntity {
    pub id: Uuid,
    pub form_id: Uuid,
    pub email: Option<String>,
    pub data: Json<Map<String, Value>>,
    pub status: SubmissionStatusDb,
    pub email_validated_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<SubmissionEntity> for Submission {
    fn from(entity: SubmissionEntity) -> Self {
        Self {
            id: entity.id,
            form_id: entity.form_id,
            email: entity.email,
            data: entity.data.0,
            status: entity.status.into(),
            email_validated_at: entity.email_validated_at,
            processed_at: entity.processed_at,
            created_at: entity.created_at,
        }
    }
}

/// Database row mapping for the email_validations table.
#[derive(Debug, Clone, FromRow)]
pub struct EmailValidationEntity {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub email: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<EmailValidationEntity> for EmailValidation {
    fn from(entity: EmailValidationEntity) -> Self {
        Self {
            id: entity.id,
            submission_id: entity.submission_id,
            email: entity.email,
            code_hash: entity.code_hash,
            expires_at: entity.expires_at,
            verified_at: entity.verified_at,
            created_at: entity.created_at,
        }
    }
}
