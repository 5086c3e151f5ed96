//! Form entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::{EmailValidationMode, FieldType, Form, FormField, TargetModule, ValidationRules};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for target_module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "target_module", rename_all = "snake_case")]
pub enum TargetModuleDb {
    Registratura,
    GeneralRegister,
    Events,
    Partners,
}

impl From<TargetModuleDb> for TargetModule {
    fn from(db: TargetModuleDb) -> Self {
        match db {
            TargetModuleDb::Registratura => TargetModule::Registratura,
            TargetModuleDb::GeneralRegister => TargetModule::GeneralRegister,
            TargetModuleDb::Events => TargetModule::Events,
            TargetModuleDb::Partners => TargetModule::Partners,
        }
    }
}

impl From<TargetModule> for TargetModuleDb {
    fn from(module: TargetModule) -> Self {
        match module {
            TargetModule::Registratura => TargetModuleDb::Registratura,
            TargetModule::GeneralRegister => TargetModuleDb::GeneralRegister,
            TargetModule::Events => TargetModuleDb::Events,
            TargetModule::Partners => TargetModuleDb::Partners,
        }
    }
}

/// Database enum for email_validation_mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "email_validation_mode", rename_all = "lowercase")]
pub enum EmailValidationModeDb {
    None,
    Start,
    End,
}

impl From<EmailValidationModeDb> for EmailValidationMode {
    fn from(db: EmailValidationModeDb) -> Self {
        match db {
            EmailValidationModeDb::None => EmailValidationMode::None,
            EmailValidationModeDb::Start => EmailValidationMode::Start,
            EmailValidationModeDb::End => EmailValidationMode::End,
        }
    }
}

impl From<EmailValidationMode> for EmailValidationModeDb {
    fn from(mode: EmailValidationMode) -> Self {
        match mode {
            EmailValidationMode::None => EmailValidationModeDb::None,
            EmailValidationMode::Start => EmailValidationModeDb::Start,
            EmailValidationMode::End => EmailValidationModeDb::End,
        }
    }
}

/// Database enum for form_field_type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "form_field_type", rename_all = "lowercase")]
pub enum FieldTypeDb {
    Text,
    Textarea,
    Email,
    Phone,
    Number,
    Date,
    Select,
    Radio,
    Checkbox,
}

impl From<FieldTypeDb> for FieldType {
    fn from(db: FieldTypeDb) -> Self {
        match db {
            FieldTypeDb::Text => FieldType::Text,
            FieldTypeDb::Textarea => FieldType::Textarea,
            FieldTypeDb::Email => FieldType::Email,
            FieldTypeDb::Phone => FieldType::Phone,
            FieldTypeDb::Number => FieldType::Number,
            FieldTypeDb::Date => FieldType::Date,
            FieldTypeDb::Select => FieldType::Select,
            FieldTypeDb::Radio => FieldType::Radio,
            FieldTypeDb::Checkbox => FieldType::Checkbox,
        }
    }
}

impl From<FieldType> for FieldTypeDb {
    fn from(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Text => FieldTypeDb::Text,
            FieldType::Textarea => FieldTypeDb::Textarea,
            FieldType::Email => FieldTypeDb::Email,
            FieldType::Phone => FieldTypeDb::Phone,
            FieldType::Number => FieldTypeDb::Number,
            FieldType::Date => FieldTypeDb::Date,
            FieldType::Select => FieldTypeDb::Select,
            FieldType::Radio => FieldTypeDb::Radio,
            FieldType::Checkbox => FieldTypeDb::Checkbox,
        }
    }
}

/// Database row mapping for the online_forms table.
#[derive(Debug, Clone, FromRow)]
pub struct FormEntity {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub target_module: TargetModuleDb,
    pub widget_code: String,
    pub is_active: bool,
    pub email_validation_mode: EmailValidationModeDb,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormEntity {
    /// Combines the form row with its field rows.
    pub fn into_form(self, fields: Vec<FormFieldEntity>) -> Form {
        Form {
            id: self.id,
            name: self.name,
            description: self.description,
            target_module: self.target_module.into(),
            widget_code: self.widget_code,
            is_active: self.is_active,
            email_validation_mode: self.email_validation_mode.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Database row mapping for the form_fields table.
#[derive(Debug, Clone, FromRow)]
pub struct FormFieldEntity {
    pub id: Uuid,
    pub form_id: Uuid,
    pub field_key: String,
    pub field_type: FieldTypeDb,
    pub label: String,
    pub required: bool,
    pub validation_rules: Json<ValidationRules>,
    pub options: Vec<String>,
    pub order_index: i32,
    pub position: i32,
}

impl From<FormFieldEntity> for FormField {
    fn from(entity: FormFieldEntity) -> Self {
        Self {
            id: entity.id,
            field_key: entity.field_key,
            field_type: entity.field_type.into(),
            label: entity.label,
            required: entity.required,
            validation_rules: entity.validation_rules.0,
            options: entity.options,
            order_index: entity.order_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_module_conversion() {
        for module in TargetModule::ALL {
            let db: TargetModuleDb = module.into();
            assert_eq!(TargetModule::from(db), module);
        }
    }

    #[test]
    fn test_field_conversion() {
        let entity = FormFieldEntity {
            id: Uuid::new_v4(),
            form_id: Uuid::new_v4(),
            field_key: "kind".into(),
            field_type: FieldTypeDb::Select,
            label: "Kind".into(),
            required: true,
            validation_rules: Json(ValidationRules::default()),
            options: vec!["a".into(), "b".into()],
            order_index: 3,
            position: 0,
        };
        let field: FormField = entity.into();
        assert_eq!(field.field_type, FieldType::Select);
        assert_eq!(field.options.len(), 2);
        assert_eq!(field.order_index, 3);
    }
}
