//! Email validation repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::submission::SUBMISSION_COLUMNS;
use crate::entities::{EmailValidationEntity, SubmissionEntity};
use crate::metrics::QueryTimer;

/// Repository for email validation codes.
#[derive(Clone)]
pub struct EmailValidationRepository {
    pool: PgPool,
}

impl EmailValidationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new code record. Existing records are never updated.
    pub async fn create(
        &self,
        submission_id: Uuid,
        email: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<EmailValidationEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_email_validation");
        let result = sqlx::query_as::<_, EmailValidationEntity>(
            r#"
            INSERT INTO email_validations (submission_id, email, code_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, submission_id, email, code_hash, expires_at, verified_at, created_at
            "#,
        )
        .bind(submission_id)
        .bind(email)
        .bind(code_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Consumes a matching code and marks the submission's email as validated.
    ///
    /// Any unverified, unexpired record with the same submission, email and
    /// code hash matches; the most recent one is consumed. Both updates commit
    /// together. Returns `None` without changing anything when no record
    /// matches. The submission keeps its first `email_validated_at`.
    pub async fn verify(
        &self,
        submission_id: Uuid,
        email: &str,
        code_hash: &str,
    ) -> Result<Option<SubmissionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("verify_email_validation");
        let mut tx = self.pool.begin().await?;

        let consumed: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE email_validations
            SET verified_at = NOW()
            WHERE id = (
                SELECT id FROM email_validations
                WHERE submission_id = $1
                  AND email = $2
                  AND code_hash = $3
                  AND verified_at IS NULL
                  AND expires_at > NOW()
                ORDER BY created_at DESC
                LIMIT 1
                FOR UPDATE
            )
            AND verified_at IS NULL
            RETURNING id
            "#,
        )
        .bind(submission_id)
        .bind(email)
        .bind(code_hash)
        .fetch_optional(&mut *tx)
        .await?;

        if consumed.is_none() {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        }

        let submission = sqlx::query_as::<_, SubmissionEntity>(&format!(
            r#"
            UPDATE form_submissions
            SET email_validated_at = COALESCE(email_validated_at, NOW()),
                status = CASE WHEN status = 'pending' THEN 'validated'::submission_status ELSE status END
            WHERE id = $1
            RETURNING {SUBMISSION_COLUMNS}
            "#
        ))
        .bind(submission_id)
        .fetch_optional(&mut *tx)
        .await?;

        if submission.is_none() {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        }

        tx.commit().await?;
        timer.record();
        Ok(submission)
    }
}
