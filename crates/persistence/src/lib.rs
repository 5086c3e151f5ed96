//! Persistence layer for the parish forms backend.
//!
//! This crate contains:
//! - Database connection management and migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - Query duration metrics

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
