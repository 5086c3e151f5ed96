//! Mapping dataset administration endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::mapping_dataset::{
    ApplyDatasetRequest, ApplyDatasetResponse, AvailableTable, AvailableTablesQuery,
    AvailableTablesResponse, CreateMappingDatasetRequest, ListMappingDatasetsQuery,
    MappingDatasetSummary, TestSqlRequest, TestSqlResponse, UpdateMappingDatasetRequest,
};
use domain::models::{FieldMappingInput, MappingDataset, TargetModule};
use domain::services::{
    check_mapping_rules, extract_columns, plan_dataset_application, validate_for_module,
    MappingRuleError,
};
use persistence::repositories::{FormRepository, MappingDatasetRepository, TargetTableRepository};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Operator;
use crate::middleware::metrics::record_sql_guard_rejection;

/// Rejects rules that cannot be stored for the module.
pub(crate) fn check_rules(
    module: TargetModule,
    rules: &[FieldMappingInput],
    source: &'static str,
) -> Result<(), ApiError> {
    check_mapping_rules(module, rules).map_err(|e| {
        if matches!(e, MappingRuleError::UnsafeSql { .. }) {
            record_sql_guard_rejection(source);
        }
        ApiError::from(e)
    })
}

async fn load_dataset(
    repo: &MappingDatasetRepository,
    dataset_id: Uuid,
) -> Result<MappingDataset, ApiError> {
    let entity = repo
        .find_by_id(dataset_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Mapping dataset not found".to_string()))?;
    let rules = repo.find_rules(dataset_id).await?;
    Ok(entity.into_dataset(rules))
}

/// Create a mapping dataset.
///
/// POST /api/v1/mapping-datasets
pub async fn create_dataset(
    State(state): State<AppState>,
    operator: Operator,
    Json(request): Json<CreateMappingDatasetRequest>,
) -> Result<(StatusCode, Json<MappingDataset>), ApiError> {
    request.validate()?;
    check_rules(request.target_module, &request.mappings, "dataset")?;

    let repo = MappingDatasetRepository::new(state.pool.clone());
    let (entity, rules) = repo
        .create(
            &request.name,
            request.description.as_deref(),
            request.target_module,
            Some(operator.user_id),
            &request.mappings,
        )
        .await?;
    let dataset = entity.into_dataset(rules);

    info!(
        dataset_id = %dataset.id,
        target_module = %dataset.target_module,
        rules = dataset.mappings.len(),
        operator_id = %operator.user_id,
        "Mapping dataset created"
    );

    Ok((StatusCode::CREATED, Json(dataset)))
}

/// List mapping datasets, optionally for one module.
///
/// GET /api/v1/mapping-datasets?target_module=<module>
pub async fn list_datasets(
    State(state): State<AppState>,
    _operator: Operator,
    Query(query): Query<ListMappingDatasetsQuery>,
) -> Result<Json<Vec<MappingDatasetSummary>>, ApiError> {
    let repo = MappingDatasetRepository::new(state.pool.clone());
    let datasets = repo
        .list(query.target_module)
        .await?
        .into_iter()
        .map(MappingDatasetSummary::from)
        .collect();
    Ok(Json(datasets))
}

/// Get a dataset with its rules.
///
/// GET /api/v1/mapping-datasets/:id
pub async fn get_dataset(
    State(state): State<AppState>,
    _operator: Operator,
    Path(dataset_id): Path<Uuid>,
) -> Result<Json<MappingDataset>, ApiError> {
    let repo = MappingDatasetRepository::new(state.pool.clone());
    Ok(Json(load_dataset(&repo, dataset_id).await?))
}

/// Replace a dataset's name, description and rules.
///
/// PUT /api/v1/mapping-datasets/:id
pub async fn update_dataset(
    State(state): State<AppState>,
    operator: Operator,
    Path(dataset_id): Path<Uuid>,
    Json(request): Json<UpdateMappingDatasetRequest>,
) -> Result<Json<MappingDataset>, ApiError> {
    request.validate()?;

    let repo = MappingDatasetRepository::new(state.pool.clone());
    let existing = repo
        .find_by_id(dataset_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Mapping dataset not found".to_string()))?;
    check_rules(existing.target_module.into(), &request.mappings, "dataset")?;

    let (entity, rules) = repo
        .update(
            dataset_id,
            &request.name,
            request.description.as_deref(),
            &request.mappings,
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Mapping dataset not found".to_string()))?;

    info!(
        dataset_id = %dataset_id,
        rules = rules.len(),
        operator_id = %operator.user_id,
        "Mapping dataset updated"
    );

    Ok(Json(entity.into_dataset(rules)))
}

/// Delete a dataset and its rules.
///
/// DELETE /api/v1/mapping-datasets/:id
pub async fn delete_dataset(
    State(state): State<AppState>,
    operator: Operator,
    Path(dataset_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let repo = MappingDatasetRepository::new(state.pool.clone());
    if !repo.delete(dataset_id).await? {
        return Err(ApiError::NotFound("Mapping dataset not found".to_string()));
    }

    info!(dataset_id = %dataset_id, operator_id = %operator.user_id, "Mapping dataset deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Copy a dataset's rules onto a form.
///
/// POST /api/v1/mapping-datasets/:id/apply
pub async fn apply_dataset(
    State(state): State<AppState>,
    operator: Operator,
    Path(dataset_id): Path<Uuid>,
    Json(request): Json<ApplyDatasetRequest>,
) -> Result<Json<ApplyDatasetResponse>, ApiError> {
    let dataset_repo = MappingDatasetRepository::new(state.pool.clone());
    let dataset = load_dataset(&dataset_repo, dataset_id).await?;

    let form = FormRepository::new(state.pool.clone())
        .find_by_id(request.form_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Form not found".to_string()))?;

    let rules = plan_dataset_application(&dataset, form.target_module.into()).map_err(|e| {
        warn!(dataset_id = %dataset_id, form_id = %form.id, error = %e, "Dataset not applicable");
        ApiError::from(e)
    })?;

    let mappings_applied = dataset_repo
        .apply_to_form(form.id, &rules, request.replace_existing)
        .await?;

    info!(
        dataset_id = %dataset_id,
        form_id = %form.id,
        replace_existing = request.replace_existing,
        mappings_applied,
        operator_id = %operator.user_id,
        "Mapping dataset applied"
    );

    Ok(Json(ApplyDatasetResponse { mappings_applied }))
}

/// Check an SQL fragment and report the columns it yields.
///
/// Columns come from static extraction when possible, otherwise from a
/// read-only `LIMIT 1` trial run.
///
/// POST /api/v1/mapping-datasets/test-sql
pub async fn test_sql(
    State(state): State<AppState>,
    _operator: Operator,
    Json(request): Json<TestSqlRequest>,
) -> Result<Json<TestSqlResponse>, ApiError> {
    request.validate()?;

    if let Err(rejection) = validate_for_module(&request.sql_query, request.target_module) {
        record_sql_guard_rejection("test_sql");
        return Err(rejection.into());
    }

    let columns = extract_columns(&request.sql_query);
    if !columns.is_empty() {
        return Ok(Json(TestSqlResponse {
            columns,
            sample_row: None,
        }));
    }

    let trial = TargetTableRepository::new(state.pool.clone())
        .trial_select(&request.sql_query, state.config.forms.trial_query_timeout_ms)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) => {
                ApiError::Validation(format!("Query failed: {}", db_err.message()))
            }
            other => other.into(),
        })?;

    Ok(Json(TestSqlResponse {
        columns: trial.columns,
        sample_row: trial.sample_row,
    }))
}

/// Whitelisted tables of a module with their columns.
///
/// GET /api/v1/mapping-datasets/tables?target_module=<module>
pub async fn available_tables(
    State(state): State<AppState>,
    _operator: Operator,
    Query(query): Query<AvailableTablesQuery>,
) -> Result<Json<AvailableTablesResponse>, ApiError> {
    let repo = TargetTableRepository::new(state.pool.clone());

    let mut tables = Vec::new();
    for name in query.target_module.available_tables() {
        tables.push(AvailableTable {
            name: name.to_string(),
            columns: repo.table_columns(name).await?,
        });
    }

    Ok(Json(AvailableTablesResponse {
        target_module: query.target_module,
        tables,
    }))
}
