//! Operator actions on individual submissions.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::submission::PropagateResponse;
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Operator;
use crate::services::submission::SubmissionService;

/// Retry mapped propagation for an eligible submission.
///
/// POST /api/v1/submissions/:submission_id/propagate
pub async fn propagate_submission(
    State(state): State<AppState>,
    operator: Operator,
    Path(submission_id): Path<Uuid>,
) -> Result<Json<PropagateResponse>, ApiError> {
    let response = SubmissionService::from_state(&state)
        .propagate(submission_id)
        .await?;

    info!(
        submission_id = %submission_id,
        tables_written = response.tables_written,
        operator_id = %operator.user_id,
        "Submission propagated by operator"
    );

    Ok(Json(response))
}
