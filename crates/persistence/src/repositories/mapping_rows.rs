//! Bulk insertion of mapping rules, shared by dataset and form mappings.

use domain::models::{FieldMappingInput, Transformation};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::entities::FieldMappingEntity;

/// Columns selected into [`FieldMappingEntity`].
pub(crate) const FORM_MAPPING_COLUMNS: &str =
    "id, field_key, target_table, target_column, mapping_type, sql_query, transformation, position";

/// Table a set of rules belongs to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RuleOwner {
    Dataset,
    Form,
}

impl RuleOwner {
    fn insert_sql(&self) -> &'static str {
        match self {
            RuleOwner::Dataset => {
                r#"
                INSERT INTO mapping_dataset_rules
                    (dataset_id, field_key, target_table, target_column, mapping_type, sql_query, transformation, position)
                SELECT $1, r.field_key, r.target_table, r.target_column, r.mapping_type::mapping_type,
                       r.sql_query, r.transformation::jsonb, r.position
                FROM UNNEST($2::text[], $3::text[], $4::text[], $5::text[], $6::text[], $7::text[], $8::int[])
                    AS r(field_key, target_table, target_column, mapping_type, sql_query, transformation, position)
                RETURNING id, field_key, target_table, target_column, mapping_type, sql_query, transformation, position
                "#
            }
            RuleOwner::Form => {
                r#"
                INSERT INTO form_field_mappings
                    (form_id, field_key, target_table, target_column, mapping_type, sql_query, transformation, position)
                SELECT $1, r.field_key, r.target_table, r.target_column, r.mapping_type::mapping_type,
                       r.sql_query, r.transformation::jsonb, r.position
                FROM UNNEST($2::text[], $3::text[], $4::text[], $5::text[], $6::text[], $7::text[], $8::int[])
                    AS r(field_key, target_table, target_column, mapping_type, sql_query, transformation, position)
                RETURNING id, field_key, target_table, target_column, mapping_type, sql_query, transformation, position
                "#
            }
        }
    }
}

/// Inserts all rules in one statement, numbering positions from `start_position`.
///
/// Target tables are stored lowercased.
pub(crate) async fn insert_rules(
    tx: &mut Transaction<'_, Postgres>,
    owner: RuleOwner,
    owner_id: Uuid,
    rules: &[FieldMappingInput],
    start_position: i32,
) -> Result<Vec<FieldMappingEntity>, sqlx::Error> {
    if rules.is_empty() {
        return Ok(Vec::new());
    }

    let mut field_keys = Vec::with_capacity(rules.len());
    let mut tables = Vec::with_capacity(rules.len());
    let mut columns = Vec::with_capacity(rules.len());
    let mut types = Vec::with_capacity(rules.len());
    let mut queries: Vec<Option<String>> = Vec::with_capacity(rules.len());
    let mut transformations: Vec<Option<String>> = Vec::with_capacity(rules.len());
    let mut positions = Vec::with_capacity(rules.len());

    for (offset, rule) in rules.iter().enumerate() {
        field_keys.push(rule.field_key.clone());
        tables.push(rule.target_table.to_lowercase());
        columns.push(rule.target_column.clone());
        types.push(rule.mapping_type.as_str().to_string());
        queries.push(rule.sql_query.clone());
        transformations.push(encode_transformation(rule.transformation.as_ref())?);
        positions.push(start_position + offset as i32);
    }

    sqlx::query_as::<_, FieldMappingEntity>(owner.insert_sql())
        .bind(owner_id)
        .bind(&field_keys)
        .bind(&tables)
        .bind(&columns)
        .bind(&types)
        .bind(&queries)
        .bind(&transformations)
        .bind(&positions)
        .fetch_all(&mut **tx)
        .await
        .map(|mut rows| {
            rows.sort_by_key(|r| r.position);
            rows
        })
}

/// JSON text for the `transformation` column.
fn encode_transformation(
    transformation: Option<&Transformation>,
) -> Result<Option<String>, sqlx::Error> {
    transformation
        .map(|t| serde_json::to_string(t).map_err(|e| sqlx::Error::Protocol(e.to_string())))
        .transpose()
}
