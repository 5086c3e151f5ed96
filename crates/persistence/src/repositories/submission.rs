//! Submission repository for database operations.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::SubmissionEntity;
use crate::metrics::QueryTimer;

pub(crate) const SUBMISSION_COLUMNS: &str =
    "id, form_id, email, data, status, email_validated_at, processed_at, created_at";

/// Repository for form submissions.
#[derive(Clone)]
pub struct SubmissionRepository {
    pool: PgPool,
}

impl SubmissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a submission in `pending` state.
    pub async fn create(
        &self,
        form_id: Uuid,
        email: Option<&str>,
        data: &Map<String, Value>,
    ) -> Result<SubmissionEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_submission");
        let result = sqlx::query_as::<_, SubmissionEntity>(&format!(
            r#"
            INSERT INTO form_submissions (form_id, email, data)
            VALUES ($1, $2, $3)
            RETURNING {SUBMISSION_COLUMNS}
            "#
        ))
        .bind(form_id)
        .bind(email)
        .bind(Json(data))
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a submission by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<SubmissionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_submission_by_id");
        let result = sqlx::query_as::<_, SubmissionEntity>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM form_submissions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Page of a form's submissions, newest first, strictly after the cursor.
    ///
    /// Fetches `limit + 1` rows so the caller can tell whether another page exists.
    pub async fn list_for_form(
        &self,
        form_id: Uuid,
        cursor: Option<(DateTime<Utc>, Uuid)>,
        limit: i64,
    ) -> Result<Vec<SubmissionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_form_submissions");
        let (cursor_at, cursor_id) = cursor.unzip();
        let result = sqlx::query_as::<_, SubmissionEntity>(&format!(
            r#"
            SELECT {SUBMISSION_COLUMNS}
            FROM form_submissions
            WHERE form_id = $1
              AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#
        ))
        .bind(form_id)
        .bind(cursor_at)
        .bind(cursor_id)
        .bind(limit + 1)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
