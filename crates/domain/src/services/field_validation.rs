//! Per-field validation of public submissions.
//!
//! Fields are checked in `order_index` order and the first failure is
//! reported, so identical input always yields the same error.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::warn;
use validator::ValidateEmail;

use crate::models::{FieldType, FormField};

lazy_static! {
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9][0-9 ().\-]{5,19}$").unwrap();
}

/// Date format accepted by `date` fields.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// First failing field of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FieldValidationError {
    pub field_key: String,
    pub message: String,
}

impl FieldValidationError {
    fn new(field: &FormField, message: impl Into<String>) -> Self {
        Self {
            field_key: field.field_key.clone(),
            message: message.into(),
        }
    }
}

/// Validates submitted values against the form's fields.
///
/// Returns the cleaned values: trimmed strings, numbers and booleans in their
/// JSON types. Every declared field is present; a blank optional field is
/// `null` (`false` for a checkbox). Undeclared keys are dropped.
pub fn validate_submission(
    fields: &[FormField],
    data: &Map<String, Value>,
) -> Result<Map<String, Value>, FieldValidationError> {
    let mut ordered: Vec<&FormField> = fields.iter().collect();
    ordered.sort_by_key(|f| f.order_index);

    let mut cleaned = Map::new();
    for field in ordered {
        let value = data.get(&field.field_key).unwrap_or(&Value::Null);
        if is_blank(field, value) {
            if field.required {
                return Err(FieldValidationError::new(
                    field,
                    format!("{} is required", field.label),
                ));
            }
            let empty = match field.field_type {
                FieldType::Checkbox => Value::Bool(false),
                _ => Value::Null,
            };
            cleaned.insert(field.field_key.clone(), empty);
            continue;
        }
        let clean = validate_value(field, value)?;
        cleaned.insert(field.field_key.clone(), clean);
    }
    Ok(cleaned)
}

fn is_blank(field: &FormField, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(false) => field.field_type == FieldType::Checkbox,
        _ => false,
    }
}

fn validate_value(field: &FormField, value: &Value) -> Result<Value, FieldValidationError> {
    let label = &field.label;
    match field.field_type {
        FieldType::Number => {
            let number = as_number(value)
                .ok_or_else(|| FieldValidationError::new(field, format!("{} must be a number", label)))?;
            check_range(field, number)?;
            Ok(number_value(number))
        }
        FieldType::Checkbox => as_bool(value)
            .map(Value::Bool)
            .ok_or_else(|| FieldValidationError::new(field, format!("{} must be true or false", label))),
        _ => {
            let text = as_text(value)
                .ok_or_else(|| FieldValidationError::new(field, format!("{} must be text", label)))?;
            check_text(field, &text)?;
            Ok(Value::String(text))
        }
    }
}

fn check_text(field: &FormField, text: &str) -> Result<(), FieldValidationError> {
    let label = &field.label;
    match field.field_type {
        FieldType::Email if !text.validate_email() => {
            return Err(FieldValidationError::new(
                field,
                format!("{} must be a valid email address", label),
            ));
        }
        FieldType::Phone if !PHONE_REGEX.is_match(text) => {
            return Err(FieldValidationError::new(
                field,
                format!("{} must be a valid phone number", label),
            ));
        }
        FieldType::Date if NaiveDate::parse_from_str(text, DATE_FORMAT).is_err() => {
            return Err(FieldValidationError::new(
                field,
                format!("{} must be a date in YYYY-MM-DD format", label),
            ));
        }
        FieldType::Select | FieldType::Radio if !field.options.iter().any(|o| o == text) => {
            return Err(FieldValidationError::new(
                field,
                format!("{} must be one of the allowed options", label),
            ));
        }
        _ => {}
    }

    let rules = &field.validation_rules;
    let length = text.chars().count();
    if let Some(min) = rules.min_length {
        if length < min {
            return Err(FieldValidationError::new(
                field,
                format!("{} must be at least {} characters", label, min),
            ));
        }
    }
    if let Some(max) = rules.max_length {
        if length > max {
            return Err(FieldValidationError::new(
                field,
                format!("{} must be at most {} characters", label, max),
            ));
        }
    }
    if let Some(pattern) = &rules.pattern {
        match Regex::new(pattern) {
            Ok(re) if !re.is_match(text) => {
                return Err(FieldValidationError::new(
                    field,
                    format!("{} has an invalid format", label),
                ));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(field_key = %field.field_key, error = %e, "Ignoring invalid validation pattern");
            }
        }
    }
    Ok(())
}

fn check_range(field: &FormField, number: f64) -> Result<(), FieldValidationError> {
    let rules = &field.validation_rules;
    if let Some(min) = rules.min {
        if number < min {
            return Err(FieldValidationError::new(
                field,
                format!("{} must be at least {}", field.label, min),
            ));
        }
    }
    if let Some(max) = rules.max {
        if number > max {
            return Err(FieldValidationError::new(
                field,
                format!("{} must be at most {}", field.label, max),
            ));
        }
    }
    Ok(())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

pub(crate) fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "on" | "yes" | "da" => Some(true),
            "false" | "0" | "off" | "no" | "nu" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Integral values become JSON integers, everything else a float.
pub(crate) fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Value::Number(Number::from(number as i64))
    } else {
        Number::from_f64(number).map_or(Value::Null, Value::Number)
    }
}
