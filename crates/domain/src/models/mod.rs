//! Domain models for the parish forms backend.

pub mod email_validation;
pub mod form;
pub mod mapping;
pub mod mapping_dataset;
pub mod submission;
pub mod target_module;

pub use email_validation::EmailValidation;
pub use form::{EmailValidationMode, FieldType, Form, FormField, ValidationRules};
pub use mapping::{FieldMapping, FieldMappingInput, MappingType, Transformation};
pub use mapping_dataset::MappingDataset;
pub use submission::{Submission, SubmissionStatus};
pub use target_module::TargetModule;
