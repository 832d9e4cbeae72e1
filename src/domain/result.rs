//! Result type alias for Conveyor

use super::errors::BeltError;

/// Result type alias for Conveyor operations
///
/// # Examples
///
/// ```
/// use conveyor::domain::result::Result;
/// use conveyor::domain::errors::BeltError;
///
/// fn failing_function() -> Result<()> {
///     Err(BeltError::Misconfigured("missing handler".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, BeltError>;
