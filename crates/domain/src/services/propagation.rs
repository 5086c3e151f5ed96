//! Planning of mapped propagation into target tables.
//!
//! A plan is pure data: which table gets which columns with which values.
//! Executing it (one insert per table, all in one transaction) is left to
//! the persistence layer.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::sql_guard::{validate_for_module, SqlRejection};
use super::transformation::{apply_transformation, TransformError};
use crate::models::{FieldMapping, MappingType, TargetModule};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropagationError {
    #[error("Table '{table}' is not allowed for module {module}")]
    TableNotAllowed { table: String, module: TargetModule },

    #[error("Invalid target column '{0}'")]
    InvalidColumn(String),

    #[error("Mapping for '{0}' is of type sql but has no query")]
    MissingSqlQuery(String),

    #[error("Mapping for '{field_key}' has an unsafe query: {source}")]
    UnsafeSql {
        field_key: String,
        source: SqlRejection,
    },

    #[error("Field '{field_key}': {source}")]
    Transform {
        field_key: String,
        source: TransformError,
    },
}

/// Value written to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteValue {
    /// A literal value.
    Value(Value),
    /// First column of the first row of `sql_query`, with `param` bound as `$1`.
    Query { sql_query: String, param: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnWrite {
    pub column: String,
    pub value: WriteValue,
}

/// One row to insert into one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableWrite {
    pub table: String,
    pub columns: Vec<ColumnWrite>,
}

/// Builds the writes a submission's data produces under the given mappings.
///
/// Mappings run in position order. `data` holds every field the form
/// declares, blank ones as `null`, so a blank value still reaches its
/// transformation. A mapping whose field the form no longer declares is
/// skipped. When two mappings target the same column, the first wins.
/// Tables appear in order of their first mapping.
pub fn plan_propagation(
    module: TargetModule,
    mappings: &[FieldMapping],
    data: &Map<String, Value>,
) -> Result<Vec<TableWrite>, PropagationError> {
    let mut ordered: Vec<&FieldMapping> = mappings.iter().collect();
    ordered.sort_by_key(|m| m.position);

    let mut writes: Vec<TableWrite> = Vec::new();
    for mapping in ordered {
        if !module.allows_table(&mapping.target_table) {
            return Err(PropagationError::TableNotAllowed {
                table: mapping.target_table.clone(),
                module,
            });
        }
        if !shared::validation::is_sql_identifier(&mapping.target_column) {
            return Err(PropagationError::InvalidColumn(mapping.target_column.clone()));
        }

        let Some(raw) = data.get(&mapping.field_key) else {
            debug!(field_key = %mapping.field_key, "Skipping mapping for undeclared field");
            continue;
        };

        let value = match &mapping.transformation {
            Some(t) => apply_transformation(t, raw).map_err(|source| PropagationError::Transform {
                field_key: mapping.field_key.clone(),
                source,
            })?,
            None => raw.clone(),
        };

        let write_value = match mapping.mapping_type {
            MappingType::Sql => {
                let sql_query = mapping
                    .sql_query
                    .as_deref()
                    .ok_or_else(|| PropagationError::MissingSqlQuery(mapping.field_key.clone()))?;
                validate_for_module(sql_query, module).map_err(|source| {
                    PropagationError::UnsafeSql {
                        field_key: mapping.field_key.clone(),
                        source,
                    }
                })?;
                WriteValue::Query {
                    sql_query: sql_query.to_string(),
                    param: value,
                }
            }
            MappingType::Direct | MappingType::Transform => WriteValue::Value(value),
        };

        let table = mapping.target_table.to_lowercase();
        let index = match writes.iter().position(|w| w.table == table) {
            Some(index) => index,
            None => {
                writes.push(TableWrite {
                    table,
                    columns: Vec::new(),
                });
                writes.len() - 1
            }
        };
        let write = &mut writes[index];
        if write.columns.iter().any(|c| c.column == mapping.target_column) {
            debug!(column = %mapping.target_column, "Column already mapped, keeping first mapping");
            continue;
        }
        write.columns.push(ColumnWrite {
            column: mapping.target_column.clone(),
            value: write_value,
        });
    }

    Ok(writes)
}
