//! Declarative value transformations applied during propagation.

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use serde_json::Value;
use std::fmt::Write;
use thiserror::Error;

use super::field_validation::{as_bool, as_number, number_value};
use crate::models::Transformation;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("'{value}' is not a date in format {format}")]
    InvalidDate { value: String, format: String },

    #[error("No lookup value for '{0}'")]
    LookupMiss(String),

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("'{0}' is not a boolean")]
    NotABoolean(String),

    #[error("'{0}' is not a usable date pattern")]
    InvalidPattern(String),
}

/// Checks a transformation before it is stored.
///
/// Date patterns must parse as strftime and the output pattern must be able to
/// render a plain date (no time or zone fields).
pub fn check_transformation(transformation: &Transformation) -> Result<(), TransformError> {
    if let Transformation::DateFormat { from, to } = transformation {
        for pattern in [from, to] {
            if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                return Err(TransformError::InvalidPattern(pattern.clone()));
            }
        }
        let sample = NaiveDate::from_ymd_opt(2000, 1, 31)
            .ok_or_else(|| TransformError::InvalidPattern(to.clone()))?;
        format_date(sample, to)?;
    }
    Ok(())
}

fn format_date(date: NaiveDate, pattern: &str) -> Result<String, TransformError> {
    let mut out = String::new();
    write!(out, "{}", date.format(pattern))
        .map_err(|_| TransformError::InvalidPattern(pattern.to_string()))?;
    Ok(out)
}

/// Applies a transformation to a submitted value.
///
/// `null` passes through every transformation except `default`.
pub fn apply_transformation(
    transformation: &Transformation,
    value: &Value,
) -> Result<Value, TransformError> {
    if value.is_null() && !matches!(transformation, Transformation::Default { .. }) {
        return Ok(Value::Null);
    }

    match transformation {
        Transformation::Trim => Ok(map_string(value, |s| s.trim().to_string())),
        Transformation::Uppercase => Ok(map_string(value, str::to_uppercase)),
        Transformation::Lowercase => Ok(map_string(value, str::to_lowercase)),
        Transformation::DateFormat { from, to } => {
            let text = display(value);
            let date = NaiveDate::parse_from_str(text.trim(), from).map_err(|_| {
                TransformError::InvalidDate {
                    value: text.clone(),
                    format: from.clone(),
                }
            })?;
            format_date(date, to).map(Value::String)
        }
        Transformation::Lookup { values, default } => {
            let key = display(value);
            values
                .get(key.trim())
                .or(default.as_ref())
                .cloned()
                .ok_or(TransformError::LookupMiss(key))
        }
        Transformation::Number => as_number(value)
            .map(number_value)
            .ok_or_else(|| TransformError::NotANumber(display(value))),
        Transformation::Boolean => as_bool(value)
            .map(Value::Bool)
            .ok_or_else(|| TransformError::NotABoolean(display(value))),
        Transformation::Default { value: fallback } => {
            let blank = match value {
                Value::Null => true,
                Value::String(s) => s.trim().is_empty(),
                _ => false,
            };
            Ok(if blank { fallback.clone() } else { value.clone() })
        }
    }
}

fn map_string(value: &Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(s)),
        other => other.clone(),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_string_case_and_trim() {
        assert_eq!(
            apply_transformation(&Transformation::Trim, &json!("  Ana  ")).unwrap(),
            json!("Ana")
        );
        assert_eq!(
            apply_transformation(&Transformation::Uppercase, &json!("ion")).unwrap(),
            json!("ION")
        );
        assert_eq!(
            apply_transformation(&Transformation::Lowercase, &json!("Ana@Example.COM")).unwrap(),
            json!("ana@example.com")
        );
        assert_eq!(
            apply_transformation(&Transformation::Uppercase, &json!(7)).unwrap(),
            json!(7)
        );
    }

    #[test]
    fn test_date_format() {
        let t = Transformation::DateFormat {
            from: "%d.%m.%Y".into(),
            to: "%Y-%m-%d".into(),
        };
        assert_eq!(
            apply_transformation(&t, &json!("31.12.2024")).unwrap(),
            json!("2024-12-31")
        );
        assert!(matches!(
            apply_transformation(&t, &json!("2024-12-31")),
            Err(TransformError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_unusable_date_patterns() {
        let bad_output = Transformation::DateFormat {
            from: "%Y-%m-%d".into(),
            to: "%Q".into(),
        };
        assert_eq!(
            check_transformation(&bad_output),
            Err(TransformError::InvalidPattern("%Q".into()))
        );
        assert_eq!(
            apply_transformation(&bad_output, &json!("2024-05-01")),
            Err(TransformError::InvalidPattern("%Q".into()))
        );

        let time_output = Transformation::DateFormat {
            from: "%Y-%m-%d".into(),
            to: "%H:%M".into(),
        };
        assert!(check_transformation(&time_output).is_err());
        assert!(apply_transformation(&time_output, &json!("2024-05-01")).is_err());

        let bad_input = Transformation::DateFormat {
            from: "%d.%m.%".into(),
            to: "%Y-%m-%d".into(),
        };
        assert!(check_transformation(&bad_input).is_err());

        let fine = Transformation::DateFormat {
            from: "%d.%m.%Y".into(),
            to: "%e %B %Y".into(),
        };
        assert!(check_transformation(&fine).is_ok());
        assert!(check_transformation(&Transformation::Trim).is_ok());
    }

    #[test]
    fn test_lookup_by_code() {
        let mut values = BTreeMap::new();
        values.insert("B".to_string(), json!("Botez"));
        values.insert("1".to_string(), json!("Prima"));
        let t = Transformation::Lookup {
            values: values.clone(),
            default: None,
        };
        assert_eq!(apply_transformation(&t, &json!("B")).unwrap(), json!("Botez"));
        assert_eq!(apply_transformation(&t, &json!(1)).unwrap(), json!("Prima"));
        assert_eq!(
            apply_transformation(&t, &json!("X")),
            Err(TransformError::LookupMiss("X".into()))
        );

        let with_default = Transformation::Lookup {
            values,
            default: Some(json!("Altele")),
        };
        assert_eq!(
            apply_transformation(&with_default, &json!("X")).unwrap(),
            json!("Altele")
        );
    }

    #[test]
    fn test_number_and_boolean() {
        assert_eq!(
            apply_transformation(&Transformation::Number, &json!(" 12 ")).unwrap(),
            json!(12)
        );
        assert_eq!(
            apply_transformation(&Transformation::Number, &json!("3,5")).unwrap(),
            json!(3.5)
        );
        assert!(apply_transformation(&Transformation::Number, &json!("twelve")).is_err());
        assert_eq!(
            apply_transformation(&Transformation::Boolean, &json!("da")).unwrap(),
            json!(true)
        );
        assert_eq!(
            apply_transformation(&Transformation::Boolean, &json!(0)).unwrap(),
            json!(false)
        );
        assert!(apply_transformation(&Transformation::Boolean, &json!("perhaps")).is_err());
    }

    #[test]
    fn test_default_and_null() {
        let t = Transformation::Default {
            value: json!("n/a"),
        };
        assert_eq!(apply_transformation(&t, &json!("")).unwrap(), json!("n/a"));
        assert_eq!(apply_transformation(&t, &Value::Null).unwrap(), json!("n/a"));
        assert_eq!(apply_transformation(&t, &json!("x")).unwrap(), json!("x"));
        assert_eq!(
            apply_transformation(&Transformation::Number, &Value::Null).unwrap(),
            Value::Null
        );
    }
}
