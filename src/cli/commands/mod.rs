//! CLI command implementations

pub mod json;
pub mod query;
pub mod validate;
