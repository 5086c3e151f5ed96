//! Common validation utilities.

use validator::ValidationError;

/// Maximum length of a PostgreSQL identifier.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Maximum length of a form field key.
pub const MAX_FIELD_KEY_LENGTH: usize = 100;

/// Returns true for a plain, unquoted lowercase SQL identifier (`[a-z_][a-z0-9_]*`).
pub fn is_sql_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    value.len() <= MAX_IDENTIFIER_LENGTH
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Validates that a target column name is a plain SQL identifier.
pub fn validate_sql_identifier(value: &str) -> Result<(), ValidationError> {
    if is_sql_identifier(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("sql_identifier");
        err.message = Some(
            "Must be a lowercase identifier of letters, digits and underscores".into(),
        );
        Err(err)
    }
}

/// Validates a form field key: starts with a letter, then letters, digits, `_` or `-`.
pub fn validate_field_key(value: &str) -> Result<(), ValidationError> {
    let mut chars = value.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if starts_ok && rest_ok && value.len() <= MAX_FIELD_KEY_LENGTH {
        Ok(())
    } else {
        let mut err = ValidationError::new("field_key");
        err.message = Some("Field key must start with a letter and contain only letters, digits, '_' or '-'".into());
        Err(err)
    }
}

/// Validates a six digit email validation code.
pub fn validate_validation_code(value: &str) -> Result<(), ValidationError> {
    if crate::crypto::is_validation_code_format(value.trim()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("validation_code");
        err.message = Some("Validation code must be 6 digits".into());
        Err(err)
    }
}
