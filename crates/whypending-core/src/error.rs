// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for whypending data handling
#[derive(Error, Debug, Diagnostic)]
pub enum CoreError {
    /// Quantity string could not be parsed
    #[error("Invalid quantity '{value}': {reason}")]
    #[diagnostic(
        code(whypending::invalid_quantity),
        help("Quantities look like '500m', '2', '1.5Gi' or '1e3'")
    )]
    InvalidQuantity {
        #[allow(unused)]
        value: String,
        #[allow(unused)]
        reason: String,
    },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create an InvalidQuantity error
    pub fn invalid_quantity(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::invalid_quantity("12x", "unknown suffix 'x'");
        assert!(matches!(err, CoreError::InvalidQuantity { .. }));
        assert_eq!(err.to_string(), "Invalid quantity '12x': unknown suffix 'x'");
    }
}
