//! Domain error types
//!
//! This module defines the error hierarchy for Conveyor. The first four variants
//! of [`BeltError`] are the run-level taxonomy the runner reasons about; the rest
//! are infrastructure failures that are always fatal to a run.

use crate::core::collector::CollectedFailure;
use thiserror::Error;

/// Main Conveyor error type
#[derive(Debug, Error)]
pub enum BeltError {
    /// Caller wiring defect: missing hook, wrong return shape, unsupported
    /// record type for the requested mode. Never retried.
    #[error("{0}")]
    Misconfigured(String),

    /// A per-record handler failed under the fail-fast policy
    #[error("Failed to process {row_name} {record}: {source}")]
    RecordFailure {
        /// Display label of the record kind (e.g. "user")
        row_name: String,
        /// Identity rendering of the failing record
        record: String,
        /// Cause raised by the handler
        #[source]
        source: anyhow::Error,
    },

    /// The run was cancelled, either by a negative step-mode confirmation
    /// (message-bearing) or by a request that ends the run early such as
    /// `--dump-sql` (message-less)
    #[error("{}", .message.as_deref().unwrap_or("Run aborted"))]
    UserAbort {
        /// Message shown to the user, if any
        message: Option<String>,
    },

    /// One or more record failures were collected during the run
    #[error("{} record failure(s) collected during run", .failures.len())]
    AggregateFailure {
        /// Collected failures in encounter order
        failures: Vec<CollectedFailure>,
    },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Data source errors (fetching, decoding)
    #[error("Data source error: {0}")]
    Source(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(String),

    /// Transaction scope errors
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl BeltError {
    /// Abort carrying a message for the user
    pub fn abort(message: impl Into<String>) -> Self {
        BeltError::UserAbort {
            message: Some(message.into()),
        }
    }

    /// Abort without a message
    pub fn silent_abort() -> Self {
        BeltError::UserAbort { message: None }
    }

    /// Returns true for caller wiring defects
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, BeltError::Misconfigured(_))
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for BeltError {
    fn from(err: std::io::Error) -> Self {
        BeltError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for BeltError {
    fn from(err: serde_json::Error) -> Self {
        BeltError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for BeltError {
    fn from(err: toml::de::Error) -> Self {
        BeltError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<tokio_postgres::Error> for BeltError {
    fn from(err: tokio_postgres::Error) -> Self {
        BeltError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_misconfigured_display_is_bare_message() {
        let err = BeltError::Misconfigured("You must implement query()".to_string());
        assert_eq!(err.to_string(), "You must implement query()");
        assert!(err.is_misconfiguration());
    }

    #[test]
    fn test_record_failure_keeps_source() {
        let err = BeltError::RecordFailure {
            row_name: "user".to_string(),
            record: "#7".to_string(),
            source: anyhow::anyhow!("duplicate email"),
        };
        assert_eq!(err.to_string(), "Failed to process user #7: duplicate email");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("duplicate email"));
    }

    #[test]
    fn test_user_abort_messages() {
        assert_eq!(
            BeltError::abort("Operation cancelled.").to_string(),
            "Operation cancelled."
        );
        assert_eq!(BeltError::silent_abort().to_string(), "Run aborted");
        assert!(matches!(
            BeltError::silent_abort(),
            BeltError::UserAbort { message: None }
        ));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: BeltError = io_err.into();
        assert!(matches!(err, BeltError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: BeltError = json_err.into();
        assert!(matches!(err, BeltError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: BeltError = toml_err.into();
        assert!(matches!(err, BeltError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }
}
