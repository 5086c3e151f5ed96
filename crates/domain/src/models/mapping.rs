//! Field mapping rules: how one form field lands in one table column.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// How a mapped value is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingType {
    /// The submitted value is written as-is.
    Direct,
    /// The submitted value is bound as `$1` into a validated SELECT whose first column is written.
    Sql,
    /// The submitted value is passed through a declarative transformation.
    Transform,
}

impl MappingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingType::Direct => "direct",
            MappingType::Sql => "sql",
            MappingType::Transform => "transform",
        }
    }
}

impl fmt::Display for MappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declarative description of a value conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transformation {
    Trim,
    Uppercase,
    Lowercase,
    /// Reformat a date, e.g. `%d.%m.%Y` to `%Y-%m-%d`.
    DateFormat { from: String, to: String },
    /// Lookup-by-code: replace the submitted code with the mapped value.
    Lookup {
        values: BTreeMap<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },
    Number,
    Boolean,
    /// Substitute a value when the submitted one is empty.
    Default { value: Value },
}

/// A field mapping as stored on a dataset or a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub id: Uuid,
    pub field_key: String,
    pub target_table: String,
    pub target_column: String,
    pub mapping_type: MappingType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation: Option<Transformation>,
    pub position: i32,
}

/// A mapping rule as submitted by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FieldMappingInput {
    #[validate(custom(function = "shared::validation::validate_field_key"))]
    pub field_key: String,

    #[validate(length(min = 1, max = 63, message = "targetTable must be 1-63 characters"))]
    pub target_table: String,

    #[validate(custom(function = "shared::validation::validate_sql_identifier"))]
    pub target_column: String,

    pub mapping_type: MappingType,

    #[validate(length(max = 4000, message = "sqlQuery must be at most 4000 characters"))]
    pub sql_query: Option<String>,

    pub transformation: Option<Transformation>,
}

impl From<&FieldMapping> for FieldMappingInput {
    fn from(mapping: &FieldMapping) -> Self {
        Self {
            field_key: mapping.field_key.clone(),
            target_table: mapping.target_table.clone(),
            target_column: mapping.target_column.clone(),
            mapping_type: mapping.mapping_type,
            sql_query: mapping.sql_query.clone(),
            transformation: mapping.transformation.clone(),
        }
    }
}

/// Request to replace a form's mappings.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceFormMappingsRequest {
    #[validate(length(max = 200, message = "At most 200 mappings per form"))]
    #[validate(nested)]
    pub mappings: Vec<FieldMappingInput>,
}

/// Response listing a form's mappings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormMappingsResponse {
    pub form_id: Uuid,
    pub mappings: Vec<FieldMapping>,
}
