//! Rule checks for mapping datasets and form mappings, and dataset application planning.

use thiserror::Error;

use super::sql_guard::{validate_for_module, SqlRejection};
use super::transformation::{check_transformation, TransformError};
use crate::models::{FieldMappingInput, MappingDataset, MappingType, TargetModule};

/// A rule that cannot be stored for the given module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingRuleError {
    #[error("Mapping {index} ('{field_key}'): table '{table}' is not allowed for module {module}")]
    TableNotAllowed {
        index: usize,
        field_key: String,
        table: String,
        module: TargetModule,
    },

    #[error("Mapping {index} ('{field_key}'): sql mappings require sqlQuery")]
    MissingSqlQuery { index: usize, field_key: String },

    #[error("Mapping {index} ('{field_key}'): transform mappings require transformation")]
    MissingTransformation { index: usize, field_key: String },

    #[error("Mapping {index} ('{field_key}'): {source}")]
    InvalidTransformation {
        index: usize,
        field_key: String,
        source: TransformError,
    },

    #[error("Mapping {index} ('{field_key}'): {source}")]
    UnsafeSql {
        index: usize,
        field_key: String,
        source: SqlRejection,
    },
}

/// Checks every rule against the module's whitelist and the SQL guard.
pub fn check_mapping_rules(
    module: TargetModule,
    rules: &[FieldMappingInput],
) -> Result<(), MappingRuleError> {
    for (index, rule) in rules.iter().enumerate() {
        if !module.allows_table(&rule.target_table) {
            return Err(MappingRuleError::TableNotAllowed {
                index,
                field_key: rule.field_key.clone(),
                table: rule.target_table.clone(),
                module,
            });
        }

        match rule.mapping_type {
            MappingType::Sql if rule.sql_query.is_none() => {
                return Err(MappingRuleError::MissingSqlQuery {
                    index,
                    field_key: rule.field_key.clone(),
                });
            }
            MappingType::Transform if rule.transformation.is_none() => {
                return Err(MappingRuleError::MissingTransformation {
                    index,
                    field_key: rule.field_key.clone(),
                });
            }
            _ => {}
        }

        if let Some(transformation) = &rule.transformation {
            check_transformation(transformation).map_err(|source| {
                MappingRuleError::InvalidTransformation {
                    index,
                    field_key: rule.field_key.clone(),
                    source,
                }
            })?;
        }

        if let Some(sql) = &rule.sql_query {
            validate_for_module(sql, module).map_err(|source| MappingRuleError::UnsafeSql {
                index,
                field_key: rule.field_key.clone(),
                source,
            })?;
        }
    }
    Ok(())
}

/// Why a dataset cannot be applied to a form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("Dataset targets module {dataset} but the form targets {form}")]
    ModuleMismatch {
        dataset: TargetModule,
        form: TargetModule,
    },

    #[error("Dataset rule for '{field_key}' targets table '{table}', which is not allowed for module {module}")]
    TableNotAllowed {
        field_key: String,
        table: String,
        module: TargetModule,
    },
}

/// Builds the mappings a form receives from a dataset.
///
/// The module must match and every rule's table is re-checked against the
/// whitelist. Rules are copied in position order without their SQL: an `sql`
/// rule becomes `transform` when it carries a transformation, `direct`
/// otherwise. SQL-based mappings must be re-entered in the form's own context.
pub fn plan_dataset_application(
    dataset: &MappingDataset,
    form_module: TargetModule,
) -> Result<Vec<FieldMappingInput>, ApplyError> {
    if dataset.target_module != form_module {
        return Err(ApplyError::ModuleMismatch {
            dataset: dataset.target_module,
            form: form_module,
        });
    }

    let mut rules: Vec<_> = dataset.mappings.iter().collect();
    rules.sort_by_key(|m| m.position);

    rules
        .into_iter()
        .map(|rule| {
            if !form_module.allows_table(&rule.target_table) {
                return Err(ApplyError::TableNotAllowed {
                    field_key: rule.field_key.clone(),
                    table: rule.target_table.clone(),
                    module: form_module,
                });
            }
            let mapping_type = match (rule.mapping_type, &rule.transformation) {
                (MappingType::Sql, Some(_)) => MappingType::Transform,
                (MappingType::Sql, None) => MappingType::Direct,
                (other, _) => other,
            };
            Ok(FieldMappingInput {
                field_key: rule.field_key.clone(),
                target_table: rule.target_table.clone(),
                target_column: rule.target_column.clone(),
                mapping_type,
                sql_query: None,
                transformation: rule.transformation.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldMapping, Transformation};
    use chrono::Utc;
    use uuid::Uuid;

    fn input(table: &str, mapping_type: MappingType) -> FieldMappingInput {
        FieldMappingInput {
            field_key: "name".into(),
            target_table: table.into(),
            target_column: "name".into(),
            mapping_type,
            sql_query: None,
            transformation: None,
        }
    }

    fn rule(position: i32, key: &str, table: &str, mapping_type: MappingType) -> FieldMapping {
        FieldMapping {
            id: Uuid::new_v4(),
            field_key: key.into(),
            target_table: table.into(),
            target_column: key.into(),
            mapping_type,
            sql_query: None,
            transformation: None,
            position,
        }
    }

    fn dataset(module: TargetModule, mappings: Vec<FieldMapping>) -> MappingDataset {
        MappingDataset {
            id: Uuid::new_v4(),
            name: "Events".into(),
            description: None,
            target_module: module,
            created_by: None,
            mappings,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_check_rules_whitelist() {
        assert!(check_mapping_rules(TargetModule::Events, &[input("events", MappingType::Direct)]).is_ok());
        let err = check_mapping_rules(
            TargetModule::Events,
            &[input("events", MappingType::Direct), input("partners", MappingType::Direct)],
        )
        .unwrap_err();
        assert!(matches!(err, MappingRuleError::TableNotAllowed { index: 1, .. }));
    }

    #[test]
    fn test_check_rules_type_requirements() {
        assert!(matches!(
            check_mapping_rules(TargetModule::Events, &[input("events", MappingType::Sql)]),
            Err(MappingRuleError::MissingSqlQuery { .. })
        ));
        assert!(matches!(
            check_mapping_rules(TargetModule::Events, &[input("events", MappingType::Transform)]),
            Err(MappingRuleError::MissingTransformation { .. })
        ));

        let mut sql = input("events", MappingType::Sql);
        sql.sql_query = Some("SELECT id FROM partners".into());
        assert!(matches!(
            check_mapping_rules(TargetModule::Events, &[sql.clone()]),
            Err(MappingRuleError::UnsafeSql { .. })
        ));
        sql.sql_query = Some("SELECT id FROM events WHERE title = $1".into());
        assert!(check_mapping_rules(TargetModule::Events, &[sql]).is_ok());
    }

    #[test]
    fn test_check_rules_rejects_unusable_date_pattern() {
        let mut date = input("events", MappingType::Transform);
        date.transformation = Some(Transformation::DateFormat {
            from: "%Y-%m-%d".into(),
            to: "%Q".into(),
        });
        let err = check_mapping_rules(TargetModule::Events, &[date.clone()]).unwrap_err();
        assert!(matches!(err, MappingRuleError::InvalidTransformation { index: 0, .. }));
        assert!(err.to_string().contains("%Q"));

        date.transformation = Some(Transformation::DateFormat {
            from: "%d.%m.%Y".into(),
            to: "%Y-%m-%d".into(),
        });
        assert!(check_mapping_rules(TargetModule::Events, &[date]).is_ok());
    }

    #[test]
    fn test_apply_rejects_module_mismatch() {
        let ds = dataset(TargetModule::Events, vec![rule(0, "title", "events", MappingType::Direct)]);
        assert_eq!(
            plan_dataset_application(&ds, TargetModule::Partners),
            Err(ApplyError::ModuleMismatch {
                dataset: TargetModule::Events,
                form: TargetModule::Partners
            })
        );
    }

    #[test]
    fn test_apply_rechecks_whitelist() {
        let ds = dataset(
            TargetModule::Events,
            vec![rule(0, "title", "document_registry", MappingType::Direct)],
        );
        assert!(matches!(
            plan_dataset_application(&ds, TargetModule::Events),
            Err(ApplyError::TableNotAllowed { .. })
        ));
    }

    #[test]
    fn test_apply_drops_sql_and_keeps_order() {
        let mut with_sql = rule(1, "venue", "events", MappingType::Sql);
        with_sql.sql_query = Some("SELECT id FROM events".into());
        let mut with_sql_and_transform = rule(2, "kind", "events", MappingType::Sql);
        with_sql_and_transform.sql_query = Some("SELECT id FROM events".into());
        with_sql_and_transform.transformation = Some(Transformation::Uppercase);
        let ds = dataset(
            TargetModule::Events,
            vec![
                with_sql_and_transform,
                rule(0, "title", "events", MappingType::Direct),
                with_sql,
            ],
        );

        let planned = plan_dataset_application(&ds, TargetModule::Events).unwrap();
        let keys: Vec<_> = planned.iter().map(|m| m.field_key.as_str()).collect();
        assert_eq!(keys, vec!["title", "venue", "kind"]);
        assert!(planned.iter().all(|m| m.sql_query.is_none()));
        assert_eq!(planned[1].mapping_type, MappingType::Direct);
        assert_eq!(planned[2].mapping_type, MappingType::Transform);
        assert_eq!(planned[2].transformation, Some(Transformation::Uppercase));
    }

    #[test]
    fn test_apply_empty_dataset() {
        let ds = dataset(TargetModule::Partners, vec![]);
        assert!(plan_dataset_application(&ds, TargetModule::Partners).unwrap().is_empty());
    }
}
