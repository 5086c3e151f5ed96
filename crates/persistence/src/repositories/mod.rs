//! Repository implementations for database operations.

pub mod email_validation;
pub mod form;
pub mod mapping_dataset;
mod mapping_rows;
pub mod submission;
pub mod target_table;

pub use email_validation::EmailValidationRepository;
pub use form::{FormRepository, NewForm, NewFormField};
pub use mapping_dataset::MappingDatasetRepository;
pub use submission::SubmissionRepository;
pub use target_table::{PropagationStoreError, TargetTableRepository, TrialResult};
