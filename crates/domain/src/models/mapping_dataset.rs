//! Mapping dataset domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::mapping::{FieldMapping, FieldMappingInput};
use super::target_module::TargetModule;

/// Maximum rules per dataset.
pub const MAX_DATASET_RULES: usize = 200;

/// A reusable, named set of field-to-column rules scoped to a target module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDataset {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub target_module: TargetModule,
    pub created_by: Option<Uuid>,
    pub mappings: Vec<FieldMapping>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dataset listing entry (without rules).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDatasetSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub target_module: TargetModule,
    pub mapping_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a dataset.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMappingDatasetRequest {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub target_module: TargetModule,

    #[serde(default)]
    #[validate(length(max = 200, message = "At most 200 mappings per dataset"))]
    #[validate(nested)]
    pub mappings: Vec<FieldMappingInput>,
}

/// Request to replace a dataset's name, description and rules.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMappingDatasetRequest {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 200, message = "At most 200 mappings per dataset"))]
    #[validate(nested)]
    pub mappings: Vec<FieldMappingInput>,
}

/// Query for listing datasets.
#[derive(Debug, Clone, Deserialize)]
pub struct ListMappingDatasetsQuery {
    pub target_module: Option<TargetModule>,
}

/// Request to apply a dataset to a form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyDatasetRequest {
    pub form_id: Uuid,
    #[serde(default)]
    pub replace_existing: bool,
}

/// Response after applying a dataset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyDatasetResponse {
    pub mappings_applied: usize,
}

/// Request to dry-run an SQL fragment.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestSqlRequest {
    #[validate(length(min = 1, max = 4000, message = "sqlQuery must be 1-4000 characters"))]
    pub sql_query: String,
    pub target_module: TargetModule,
}

/// Result of an SQL dry run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSqlResponse {
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_row: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Query for the table listing.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailableTablesQuery {
    pub target_module: TargetModule,
}

/// A whitelisted table with its introspected columns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTable {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTablesResponse {
    pub target_module: TargetModule,
    pub tables: Vec<AvailableTable>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_request_defaults_to_merge() {
        let req: ApplyDatasetRequest = serde_json::from_value(json!({
            "formId": "7c9e6679-7425-40de-944b-e07fc1f90ae7"
        }))
        .unwrap();
        assert!(!req.replace_existing);
    }

    #[test]
    fn test_create_request_validates_nested_rules() {
        let req: CreateMappingDatasetRequest = serde_json::from_value(json!({
            "name": "Baptism requests",
            "targetModule": "registratura",
            "mappings": [{
                "fieldKey": "name",
                "targetTable": "document_registry",
                "targetColumn": "Bad Column",
                "mappingType": "direct"
            }]
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_request_empty_name_rejected() {
        let req = CreateMappingDatasetRequest {
            name: String::new(),
            description: None,
            target_module: TargetModule::Events,
            mappings: vec![],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_sample_row_omitted_when_absent() {
        let resp = TestSqlResponse {
            columns: vec!["a".into()],
            sample_row: None,
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value, json!({"columns": ["a"]}));
    }
}
