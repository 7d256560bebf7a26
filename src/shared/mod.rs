//! Cross-cutting utilities: errors, pagination, identifiers, validation
//! and shutdown plumbing.

pub mod ids;
pub mod shutdown;
pub mod types;
pub mod validations;
