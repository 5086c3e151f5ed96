//! Shared utilities and common types for the parish forms backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Verification code generation and hashing
//! - JWT verification for operator tokens
//! - Cursor pagination helpers
//! - Common validation logic

pub mod crypto;
pub mod jwt;
pub mod pagination;
pub mod validation;
