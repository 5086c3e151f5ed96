//! Domain layer for the parish forms backend.
//!
//! This crate contains:
//! - Domain models (forms, submissions, mapping datasets, email validations)
//! - Pure business logic: SQL guard, column extraction, field validation,
//!   transformations, propagation planning and verification rules

pub mod models;
pub mod services;
