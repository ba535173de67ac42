//! Result type alias for the pseudonymization engine

use super::errors::PseudoError;

/// Result type alias using [`PseudoError`]
///
/// # Examples
///
/// ```
/// use pseudo_service::domain::result::Result;
/// use pseudo_service::domain::errors::PseudoError;
///
/// fn failing_function() -> Result<()> {
///     Err(PseudoError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, PseudoError>;
