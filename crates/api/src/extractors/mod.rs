//! Custom extractors.

pub mod client_identity;
pub mod user_auth;

pub use client_identity::ClientIdentity;
pub use user_auth::Operator;
