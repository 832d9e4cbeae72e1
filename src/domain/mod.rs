//! Domain types for Conveyor.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Records** ([`Record`], [`ChangeTracked`], [`TrackedRow`]) - the units of work
//!   a data source yields
//! - **Bindings** ([`SqlValue`]) - query parameters for dumps, logs and PostgreSQL
//! - **Error types** ([`BeltError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible library operations return [`Result<T, BeltError>`]:
//!
//! ```rust
//! use conveyor::domain::{BeltError, Result};
//!
//! fn example(chunk_size: usize) -> Result<()> {
//!     if chunk_size == 0 {
//!         return Err(BeltError::Misconfigured("chunk size must be > 0".to_string()));
//!     }
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod record;
pub mod result;
pub mod value;

// Re-export commonly used types for convenience
pub use errors::BeltError;
pub use record::{display_value, ChangeTracked, FieldMap, Record, TrackedRow};
pub use result::Result;
pub use value::SqlValue;
