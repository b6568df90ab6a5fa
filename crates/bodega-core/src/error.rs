//! # Error Types
//!
//! Domain-specific error types for bodega-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bodega-core errors (this file)                                        │
//! │  ├── CoreError        - Domain rule violations, malformed keys         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bodega-store errors (separate crate)                                  │
//! │  └── StoreError       - Persistence collaborator failures              │
//! │                                                                         │
//! │  bodega-engine errors                                                  │
//! │  └── EngineError      - What callers of the engine see                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError ← StoreError          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Not-found conditions on mutation paths (deducting stock of an unknown
//! product, removing an emission nobody defined) are no-ops, not errors.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product is not in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// A product with the same (case-insensitive) name already exists.
    #[error("Product '{0}' already exists")]
    DuplicateProduct(String),

    /// A string key could not be decoded back into its tuple.
    ///
    /// ## When This Occurs
    /// - Loading a cache file with a truncated key
    /// - A stock key without any `_` separator
    #[error("Malformed {kind} key: '{key}'")]
    MalformedKey { kind: &'static str, key: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised synchronously before any state is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g. a key delimiter inside a subtype).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g. duplicate emission/subtype pair).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// The value is valid in general but not in this context.
    #[error("{field} '{value}' is not allowed: {reason}")]
    NotAllowed {
        field: String,
        value: String,
        reason: String,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::MalformedKey {
            kind: "price",
            key: "Polar".to_string(),
        };
        assert_eq!(err.to_string(), "Malformed price key: 'Polar'");

        let err = CoreError::DuplicateProduct("Polar".to_string());
        assert_eq!(err.to_string(), "Product 'Polar' already exists");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::NotAllowed {
            field: "emission".to_string(),
            value: "Six Pack".to_string(),
            reason: "only cans come in six packs".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "emission 'Six Pack' is not allowed: only cans come in six packs"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "subtype".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
