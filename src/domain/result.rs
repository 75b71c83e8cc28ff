//! Result type alias for marcport
//!
//! This module provides a convenient Result type alias that uses ExportError
//! as the error type.

use super::errors::ExportError;

/// Result type alias for marcport operations
///
/// # Examples
///
/// ```
/// use marcport::domain::result::Result;
/// use marcport::domain::errors::ExportError;
///
/// fn failing_function() -> Result<()> {
///     Err(ExportError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, ExportError>;
