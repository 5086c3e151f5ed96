//! Domain services for the forms pipeline.
//!
//! Services contain business logic that operates on domain models and never
//! touch storage.

pub mod column_extractor;
pub mod field_validation;
pub mod mapping_dataset;
pub mod propagation;
pub mod sql_guard;
pub mod transformation;
pub mod verification;

pub use column_extractor::extract_columns;
pub use field_validation::{validate_submission, FieldValidationError};
pub use mapping_dataset::{
    check_mapping_rules, plan_dataset_application, ApplyError, MappingRuleError,
};
pub use propagation::{plan_propagation, ColumnWrite, PropagationError, TableWrite, WriteValue};
pub use sql_guard::{validate_for_module, validate_sql, SqlRejection};
pub use transformation::{apply_transformation, check_transformation, TransformError};
pub use verification::{
    check_propagation_eligibility, check_resend, code_expires_at, IneligibleReason, ResendRejection,
    DEFAULT_CODE_TTL_MINUTES,
};
