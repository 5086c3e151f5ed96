//! Mapping dataset repository for database operations.

use domain::models::{FieldMappingInput, TargetModule};
use sqlx::PgPool;
use uuid::Uuid;

use super::mapping_rows::{insert_rules, RuleOwner, FORM_MAPPING_COLUMNS};
use crate::entities::{
    FieldMappingEntity, MappingDatasetEntity, MappingDatasetSummaryEntity, TargetModuleDb,
};
use crate::metrics::QueryTimer;

const DATASET_COLUMNS: &str =
    "id, name, description, target_module, created_by, created_at, updated_at";

/// Repository for mapping datasets and their rules.
#[derive(Clone)]
pub struct MappingDatasetRepository {
    pool: PgPool,
}

impl MappingDatasetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a dataset with its rules in one transaction.
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        target_module: TargetModule,
        created_by: Option<Uuid>,
        rules: &[FieldMappingInput],
    ) -> Result<(MappingDatasetEntity, Vec<FieldMappingEntity>), sqlx::Error> {
        let timer = QueryTimer::new("create_mapping_dataset");
        let mut tx = self.pool.begin().await?;

        let dataset = sqlx::query_as::<_, MappingDatasetEntity>(&format!(
            r#"
            INSERT INTO mapping_datasets (name, description, target_module, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING {DATASET_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(description)
        .bind(TargetModuleDb::from(target_module))
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        let rows = insert_rules(&mut tx, RuleOwner::Dataset, dataset.id, rules, 0).await?;

        tx.commit().await?;
        timer.record();
        Ok((dataset, rows))
    }

    /// Find a dataset by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<MappingDatasetEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_mapping_dataset_by_id");
        let result = sqlx::query_as::<_, MappingDatasetEntity>(&format!(
            "SELECT {DATASET_COLUMNS} FROM mapping_datasets WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Rules of a dataset, by position.
    pub async fn find_rules(
        &self,
        dataset_id: Uuid,
    ) -> Result<Vec<FieldMappingEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_mapping_dataset_rules");
        let result = sqlx::query_as::<_, FieldMappingEntity>(&format!(
            "SELECT {FORM_MAPPING_COLUMNS} FROM mapping_dataset_rules WHERE dataset_id = $1 ORDER BY position"
        ))
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List datasets ordered by name, optionally for one module.
    pub async fn list(
        &self,
        target_module: Option<TargetModule>,
    ) -> Result<Vec<MappingDatasetSummaryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_mapping_datasets");
        let result = sqlx::query_as::<_, MappingDatasetSummaryEntity>(
            r#"
            SELECT d.id, d.name, d.description, d.target_module, d.updated_at,
                   (SELECT COUNT(*) FROM mapping_dataset_rules r WHERE r.dataset_id = d.id) AS mapping_count
            FROM mapping_datasets d
            WHERE ($1::target_module IS NULL OR d.target_module = $1)
            ORDER BY d.name, d.id
            "#,
        )
        .bind(target_module.map(TargetModuleDb::from))
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Replace a dataset's name, description and rules in one transaction.
    ///
    /// Returns `None` when the dataset does not exist.
    pub async fn update(
        &self,
        id: Uuid,
        name: &str,
        description: Option<&str>,
        rules: &[FieldMappingInput],
    ) -> Result<Option<(MappingDatasetEntity, Vec<FieldMappingEntity>)>, sqlx::Error> {
        let timer = QueryTimer::new("update_mapping_dataset");
        let mut tx = self.pool.begin().await?;

        let dataset = sqlx::query_as::<_, MappingDatasetEntity>(&format!(
            r#"
            UPDATE mapping_datasets
            SET name = $2, description = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {DATASET_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(description)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(dataset) = dataset else {
            tx.rollback().await?;
            timer.record();
            return Ok(None);
        };

        sqlx::query("DELETE FROM mapping_dataset_rules WHERE dataset_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let rows = insert_rules(&mut tx, RuleOwner::Dataset, id, rules, 0).await?;

        tx.commit().await?;
        timer.record();
        Ok(Some((dataset, rows)))
    }

    /// Delete a dataset and its rules. Returns false when it did not exist.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_mapping_dataset");
        let result = sqlx::query("DELETE FROM mapping_datasets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Writes planned dataset rules onto a form in one transaction.
    ///
    /// With `replace_existing` every current mapping of the form is removed
    /// first. Otherwise the rules are merged: existing mappings writing the
    /// same table and column are replaced, the rest are kept, and the new
    /// rules are appended after them.
    pub async fn apply_to_form(
        &self,
        form_id: Uuid,
        rules: &[FieldMappingInput],
        replace_existing: bool,
    ) -> Result<usize, sqlx::Error> {
        let timer = QueryTimer::new("apply_mapping_dataset");
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent applies to the same form.
        sqlx::query("SELECT id FROM online_forms WHERE id = $1 FOR UPDATE")
            .bind(form_id)
            .execute(&mut *tx)
            .await?;

        if replace_existing {
            sqlx::query("DELETE FROM form_field_mappings WHERE form_id = $1")
                .bind(form_id)
                .execute(&mut *tx)
                .await?;
        } else if !rules.is_empty() {
            let tables: Vec<String> = rules.iter().map(|r| r.target_table.to_lowercase()).collect();
            let columns: Vec<String> = rules.iter().map(|r| r.target_column.clone()).collect();
            sqlx::query(
                r#"
                DELETE FROM form_field_mappings m
                USING UNNEST($2::text[], $3::text[]) AS incoming(target_table, target_column)
                WHERE m.form_id = $1
                  AND m.target_table = incoming.target_table
                  AND m.target_column = incoming.target_column
                "#,
            )
            .bind(form_id)
            .bind(&tables)
            .bind(&columns)
            .execute(&mut *tx)
            .await?;
        }

        let start_position: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM form_field_mappings WHERE form_id = $1",
        )
        .bind(form_id)
        .fetch_one(&mut *tx)
        .await?;

        let rows = insert_rules(&mut tx, RuleOwner::Form, form_id, rules, start_position).await?;
        sqlx::query("UPDATE online_forms SET updated_at = NOW() WHERE id = $1")
            .bind(form_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        timer.record();
        Ok(rows.len())
    }
}
