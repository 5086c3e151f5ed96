//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod form;
pub mod mapping;
pub mod mapping_dataset;
pub mod submission;

pub use form::{EmailValidationModeDb, FieldTypeDb, FormEntity, FormFieldEntity, TargetModuleDb};
pub use mapping::{FieldMappingEntity, MappingTypeDb};
pub use mapping_dataset::{MappingDatasetEntity, MappingDatasetSummaryEntity};
pub use submission::{EmailValidationEntity, SubmissionEntity, SubmissionStatusDb};
