//! HTTP route handlers.

pub mod forms;
pub mod health;
pub mod mapping_datasets;
pub mod public_forms;
pub mod submissions;
