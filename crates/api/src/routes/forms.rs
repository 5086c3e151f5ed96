//! Form administration endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::form::CreateFormRequest;
use domain::models::mapping::{FormMappingsResponse, ReplaceFormMappingsRequest};
use domain::models::submission::{ListSubmissionsQuery, ListSubmissionsResponse};
use domain::models::{FieldMapping, Form, Submission};
use persistence::entities::FormEntity;
use persistence::repositories::{FormRepository, NewForm, NewFormField, SubmissionRepository};
use shared::crypto::generate_widget_code;
use shared::pagination::{clamp_page_size, decode_cursor, encode_cursor};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Operator;
use crate::routes::mapping_datasets::check_rules;

async fn find_form(repo: &FormRepository, form_id: Uuid) -> Result<FormEntity, ApiError> {
    repo.find_by_id(form_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Form not found".to_string()))
}

/// Create a form with its fields. The widget code is generated.
///
/// POST /api/v1/forms
pub async fn create_form(
    State(state): State<AppState>,
    operator: Operator,
    Json(request): Json<CreateFormRequest>,
) -> Result<(StatusCode, Json<Form>), ApiError> {
    request.validate()?;

    if let Some(key) = request.duplicate_field_key() {
        return Err(ApiError::Validation(format!(
            "Duplicate field key '{}'",
            key
        )));
    }
    if let Some(key) = request.enumerated_field_without_options() {
        return Err(ApiError::Validation(format!(
            "Field '{}' needs at least one option",
            key
        )));
    }

    let fields: Vec<NewFormField> = request
        .fields
        .iter()
        .enumerate()
        .map(|(i, f)| NewFormField {
            field_key: f.field_key.clone(),
            field_type: f.field_type,
            label: f.label.clone(),
            required: f.required,
            validation_rules: f.validation_rules.clone(),
            options: f.options.clone(),
            order_index: f.order_index.unwrap_or(i as i32),
        })
        .collect();

    let widget_code = generate_widget_code();
    let repo = FormRepository::new(state.pool.clone());
    let (entity, field_rows) = repo
        .create_form(
            NewForm {
                name: &request.name,
                description: request.description.as_deref(),
                target_module: request.target_module,
                widget_code: &widget_code,
                is_active: request.is_active,
                email_validation_mode: request.email_validation_mode,
                created_by: Some(operator.user_id),
            },
            &fields,
        )
        .await?;
    let form = entity.into_form(field_rows);

    info!(
        form_id = %form.id,
        widget_code = %form.widget_code,
        target_module = %form.target_module,
        operator_id = %operator.user_id,
        "Form created"
    );

    Ok((StatusCode::CREATED, Json(form)))
}

/// Current mappings of a form.
///
/// GET /api/v1/forms/:form_id/mappings
pub async fn get_form_mappings(
    State(state): State<AppState>,
    _operator: Operator,
    Path(form_id): Path<Uuid>,
) -> Result<Json<FormMappingsResponse>, ApiError> {
    let repo = FormRepository::new(state.pool.clone());
    let form = find_form(&repo, form_id).await?;

    let mappings = repo
        .find_mappings(form.id)
        .await?
        .into_iter()
        .map(FieldMapping::from)
        .collect();

    Ok(Json(FormMappingsResponse {
        form_id: form.id,
        mappings,
    }))
}

/// Replace all mappings of a form.
///
/// SQL fragments are checked against the form's own module.
///
/// PUT /api/v1/forms/:form_id/mappings
pub async fn replace_form_mappings(
    State(state): State<AppState>,
    operator: Operator,
    Path(form_id): Path<Uuid>,
    Json(request): Json<ReplaceFormMappingsRequest>,
) -> Result<Json<FormMappingsResponse>, ApiError> {
    request.validate()?;

    let repo = FormRepository::new(state.pool.clone());
    let form = find_form(&repo, form_id).await?;
    check_rules(form.target_module.into(), &request.mappings, "form_mappings")?;

    let mappings: Vec<FieldMapping> = repo
        .replace_mappings(form.id, &request.mappings)
        .await?
        .into_iter()
        .map(FieldMapping::from)
        .collect();

    info!(
        form_id = %form.id,
        mappings = mappings.len(),
        operator_id = %operator.user_id,
        "Form mappings replaced"
    );

    Ok(Json(FormMappingsResponse {
        form_id: form.id,
        mappings,
    }))
}

/// Page through a form's submissions, newest first.
///
/// GET /api/v1/forms/:form_id/submissions?cursor=<cursor>&limit=<n>
pub async fn list_form_submissions(
    State(state): State<AppState>,
    _operator: Operator,
    Path(form_id): Path<Uuid>,
    Query(query): Query<ListSubmissionsQuery>,
) -> Result<Json<ListSubmissionsResponse>, ApiError> {
    let form = find_form(&FormRepository::new(state.pool.clone()), form_id).await?;

    let cursor = query.cursor.as_deref().map(decode_cursor).transpose()?;
    let limit = clamp_page_size(query.limit);

    let mut rows = SubmissionRepository::new(state.pool.clone())
        .list_for_form(form.id, cursor, limit)
        .await?;

    let has_more = rows.len() as i64 > limit;
    rows.truncate(limit as usize);

    let submissions: Vec<Submission> = rows.into_iter().map(Submission::from).collect();
    let next_cursor = if has_more {
        submissions
            .last()
            .map(|s| encode_cursor(s.created_at, s.id))
    } else {
        None
    };

    Ok(Json(ListSubmissionsResponse {
        submissions,
        next_cursor,
    }))
}
