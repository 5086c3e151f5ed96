//! Form domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::target_module::TargetModule;

/// When in the flow email ownership must be proven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailValidationMode {
    /// No verification; submissions are immediately eligible for propagation.
    None,
    /// Verification must complete before mapped values are written.
    Start,
    /// The raw submission is stored first, propagation waits for verification.
    End,
}

impl EmailValidationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailValidationMode::None => "none",
            EmailValidationMode::Start => "start",
            EmailValidationMode::End => "end",
        }
    }

    pub fn requires_verification(&self) -> bool {
        !matches!(self, EmailValidationMode::None)
    }
}

impl FromStr for EmailValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(EmailValidationMode::None),
            "start" => Ok(EmailValidationMode::Start),
            "end" => Ok(EmailValidationMode::End),
            _ => Err(format!("Invalid email validation mode: {}", s)),
        }
    }
}

impl fmt::Display for EmailValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input type of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
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

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
        }
    }

    /// Returns true for types whose value must be one of the field's options.
    pub fn is_enumerated(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio)
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(FieldType::Text),
            "textarea" => Ok(FieldType::Textarea),
            "email" => Ok(FieldType::Email),
            "phone" => Ok(FieldType::Phone),
            "number" => Ok(FieldType::Number),
            "date" => Ok(FieldType::Date),
            "select" => Ok(FieldType::Select),
            "radio" => Ok(FieldType::Radio),
            "checkbox" => Ok(FieldType::Checkbox),
            _ => Err(format!("Invalid field type: {}", s)),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declarative validation rules attached to a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// A field definition on a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: Uuid,
    pub field_key: String,
    pub field_type: FieldType,
    pub label: String,
    pub required: bool,
    #[serde(default)]
    pub validation_rules: ValidationRules,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub order_index: i32,
}

/// Represents an online form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub target_module: TargetModule,
    pub widget_code: String,
    pub is_active: bool,
    pub email_validation_mode: EmailValidationMode,
    pub fields: Vec<FormField>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Form {
    /// Key of the first email-typed field, by order index.
    pub fn email_field_key(&self) -> Option<&str> {
        let mut fields: Vec<&FormField> = self.fields.iter().collect();
        fields.sort_by_key(|f| f.order_index);
        fields
            .into_iter()
            .find(|f| f.field_type == FieldType::Email)
            .map(|f| f.field_key.as_str())
    }
}

/// Public form definition returned by the widget endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicFormResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub email_validation_mode: EmailValidationMode,
    pub fields: Vec<FormField>,
}

impl From<Form> for PublicFormResponse {
    fn from(form: Form) -> Self {
        let mut fields = form.fields;
        fields.sort_by_key(|f| f.order_index);
        Self {
            id: form.id,
            name: form.name,
            description: form.description,
            email_validation_mode: form.email_validation_mode,
            fields,
        }
    }
}

/// Field definition in a create request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FormFieldInput {
    #[validate(custom(function = "shared::validation::validate_field_key"))]
    pub field_key: String,

    pub field_type: FieldType,

    #[validate(length(min = 1, max = 200, message = "label must be 1-200 characters"))]
    pub label: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub validation_rules: ValidationRules,

    #[serde(default)]
    pub options: Vec<String>,

    /// Defaults to the field's position in the request.
    pub order_index: Option<i32>,
}

/// Request to create a form.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormRequest {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub target_module: TargetModule,

    #[serde(default = "default_email_validation_mode")]
    pub email_validation_mode: EmailValidationMode,

    #[serde(default = "default_is_active")]
    pub is_active: bool,

    #[validate(length(min = 1, max = 100, message = "fields must contain 1-100 items"))]
    #[validate(nested)]
    pub fields: Vec<FormFieldInput>,
}

fn default_email_validation_mode() -> EmailValidationMode {
    EmailValidationMode::None
}

fn default_is_active() -> bool {
    true
}

impl CreateFormRequest {
    /// Returns the first field key that appears more than once.
    pub fn duplicate_field_key(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.fields
            .iter()
            .map(|f| f.field_key.as_str())
            .find(|key| !seen.insert(*key))
    }

    /// Returns the first enumerated field declared without options.
    pub fn enumerated_field_without_options(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.field_type.is_enumerated() && f.options.is_empty())
            .map(|f| f.field_key.as_str())
    }
}
