//! # Error Types
//!
//! Domain-specific error types for abacus-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  abacus-core errors (this file)                                        │
//! │  ├── CoreError        - Unreadable monetary amounts                    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  abacus-db errors (separate crate)                                     │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── CheckoutError    - Order placement rejections                     │
//! │                                                                         │
//! │  Flow: ValidationError → CheckoutError → Rejection → HTTP response     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A monetary string could not be read as an exact two-digit decimal.
    #[error("Invalid amount '{input}': {reason}")]
    InvalidAmount { input: String, reason: String },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic or database access runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Collection exceeds its size limit.
    #[error("{field} cannot have more than {max} entries")]
    TooMany { field: String, max: usize },

    /// Amount does not fit in an `i64` of cents.
    #[error("{field} is too large")]
    TooLarge { field: String },
}

impl ValidationError {
    pub(crate) fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_amount_message() {
        let err = CoreError::InvalidAmount {
            input: "1.575".to_string(),
            reason: "more than two fractional digits".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid amount '1.575': more than two fractional digits"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("items").to_string(), "items is required");

        let err = ValidationError::TooShort {
            field: "username".to_string(),
            min: 3,
        };
        assert_eq!(err.to_string(), "username must be at least 3 characters");
    }

    #[test]
    fn test_too_large_message() {
        let err = ValidationError::TooLarge {
            field: "subtotal".to_string(),
        };
        assert_eq!(err.to_string(), "subtotal is too large");
    }
}
