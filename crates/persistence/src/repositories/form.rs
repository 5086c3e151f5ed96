//! Form repository for database operations.

use domain::models::{EmailValidationMode, FieldMappingInput, FieldType, TargetModule, ValidationRules};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::mapping_rows::{insert_rules, RuleOwner, FORM_MAPPING_COLUMNS};
use crate::entities::{
    EmailValidationModeDb, FieldMappingEntity, FieldTypeDb, FormEntity, FormFieldEntity,
    TargetModuleDb,
};
use crate::metrics::QueryTimer;

const FORM_COLUMNS: &str = "id, name, description, target_module, widget_code, is_active, \
     email_validation_mode, created_by, created_at, updated_at";

/// Field definition to insert with a new form.
#[derive(Debug, Clone)]
pub struct NewFormField {
    pub field_key: String,
    pub field_type: FieldType,
    pub label: String,
    pub required: bool,
    pub validation_rules: ValidationRules,
    pub options: Vec<String>,
    pub order_index: i32,
}

/// New form row.
#[derive(Debug, Clone)]
pub struct NewForm<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub target_module: TargetModule,
    pub widget_code: &'a str,
    pub is_active: bool,
    pub email_validation_mode: EmailValidationMode,
    pub created_by: Option<Uuid>,
}

/// Repository for online forms, their fields and their mappings.
#[derive(Clone)]
pub struct FormRepository {
    pool: PgPool,
}

impl FormRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a form and its fields in one transaction.
    pub async fn create_form(
        &self,
        form: NewForm<'_>,
        fields: &[NewFormField],
    ) -> Result<(FormEntity, Vec<FormFieldEntity>), sqlx::Error> {
        let timer = QueryTimer::new("create_form");
        let mut tx = self.pool.begin().await?;

        let entity = sqlx::query_as::<_, FormEntity>(&format!(
            r#"
            INSERT INTO online_forms
                (name, description, target_module, widget_code, is_active, email_validation_mode, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {FORM_COLUMNS}
            "#
        ))
        .bind(form.name)
        .bind(form.description)
        .bind(TargetModuleDb::from(form.target_module))
        .bind(form.widget_code)
        .bind(form.is_active)
        .bind(EmailValidationModeDb::from(form.email_validation_mode))
        .bind(form.created_by)
        .fetch_one(&mut *tx)
        .await?;

        let mut field_entities = Vec::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            let row = sqlx::query_as::<_, FormFieldEntity>(
                r#"
                INSERT INTO form_fields
                    (form_id, field_key, field_type, label, required, validation_rules, options, order_index, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id, form_id, field_key, field_type, label, required, validation_rules, options, order_index, position
                "#,
            )
            .bind(entity.id)
            .bind(&field.field_key)
            .bind(FieldTypeDb::from(field.field_type))
            .bind(&field.label)
            .bind(field.required)
            .bind(Json(&field.validation_rules))
            .bind(&field.options)
            .bind(field.order_index)
            .bind(position as i32)
            .fetch_one(&mut *tx)
            .await?;
            field_entities.push(row);
        }

        tx.commit().await?;
        timer.record();
        Ok((entity, field_entities))
    }

    /// Find a form by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<FormEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_form_by_id");
        let result = sqlx::query_as::<_, FormEntity>(&format!(
            "SELECT {FORM_COLUMNS} FROM online_forms WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a form by its public widget code.
    pub async fn find_by_widget_code(
        &self,
        widget_code: &str,
    ) -> Result<Option<FormEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_form_by_widget_code");
        let result = sqlx::query_as::<_, FormEntity>(&format!(
            "SELECT {FORM_COLUMNS} FROM online_forms WHERE widget_code = $1"
        ))
        .bind(widget_code)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Fields of a form in processing order.
    pub async fn find_fields(&self, form_id: Uuid) -> Result<Vec<FormFieldEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_form_fields");
        let result = sqlx::query_as::<_, FormFieldEntity>(
            r#"
            SELECT id, form_id, field_key, field_type, label, required, validation_rules, options, order_index, position
            FROM form_fields
            WHERE form_id = $1
            ORDER BY order_index, position
            "#,
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Current field mappings of a form, by position.
    pub async fn find_mappings(
        &self,
        form_id: Uuid,
    ) -> Result<Vec<FieldMappingEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_form_mappings");
        let result = sqlx::query_as::<_, FieldMappingEntity>(&format!(
            "SELECT {FORM_MAPPING_COLUMNS} FROM form_field_mappings WHERE form_id = $1 ORDER BY position"
        ))
        .bind(form_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Replace all mappings of a form in one transaction.
    pub async fn replace_mappings(
        &self,
        form_id: Uuid,
        mappings: &[FieldMappingInput],
    ) -> Result<Vec<FieldMappingEntity>, sqlx::Error> {
        let timer = QueryTimer::new("replace_form_mappings");
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM form_field_mappings WHERE form_id = $1")
            .bind(form_id)
            .execute(&mut *tx)
            .await?;
        let rows = insert_rules(&mut tx, RuleOwner::Form, form_id, mappings, 0).await?;
        sqlx::query("UPDATE online_forms SET updated_at = NOW() WHERE id = $1")
            .bind(form_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        timer.record();
        Ok(rows)
    }
}
