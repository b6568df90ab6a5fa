//! # Validation Module
//!
//! Input validation for catalog and conversion edits.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI forms (outside this workspace)                            │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Names trimmed, non-empty, bounded                                 │
//! │  ├── Key segments free of the `_` delimiter                            │
//! │  └── Amounts finite and non-negative                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Backend (unique constraints on natural keys)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed validation never mutates state.

use crate::error::ValidationError;
use crate::key::{DELIMITER, LOCAL_SEGMENT};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of a product name.
pub const MAX_NAME_LEN: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product name and returns it trimmed.
///
/// ## Example
/// ```rust
/// use bodega_core::validation::validate_product_name;
///
/// assert_eq!(validate_product_name("  Polar Pilsen ").unwrap(), "Polar Pilsen");
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

/// Validates an emission or subtype name used inside a composite key.
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must not contain the key delimiter (`_`), which would make the string
///   form of a key ambiguous when parsed from the right
/// - A subtype must not be the reserved `local` segment
pub fn validate_key_segment(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.contains(DELIMITER) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("must not contain '{}'", DELIMITER),
        });
    }

    if field == "subtype" && value.eq_ignore_ascii_case(LOCAL_SEGMENT) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("'{}' is reserved", LOCAL_SEGMENT),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price or cost amount.
///
/// Zero is allowed (priceless items are a valid, displayable state).
pub fn validate_amount(field: &str, amount: f64) -> ValidationResult<()> {
    if !amount.is_finite() {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a finite number".to_string(),
        });
    }

    if amount < 0.0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a units-per-emission value (must be >= 1).
pub fn validate_units(units: u32) -> ValidationResult<()> {
    if units == 0 {
        return Err(ValidationError::MustBePositive {
            field: "units".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_name() {
        assert_eq!(validate_product_name("Polar").unwrap(), "Polar");
        assert_eq!(validate_product_name("Zulia_Light").unwrap(), "Zulia_Light");
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_key_segment() {
        assert!(validate_key_segment("subtype", "Lata Pequeña").is_ok());
        assert!(validate_key_segment("emission", "Six Pack").is_ok());

        assert!(validate_key_segment("subtype", "").is_err());
        assert!(validate_key_segment("subtype", "Lata_Grande").is_err());
        assert!(validate_key_segment("subtype", "Local").is_err());
        // "local" is only reserved as a subtype
        assert!(validate_key_segment("emission", "Local").is_ok());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount("price", 0.0).is_ok());
        assert!(validate_amount("price", 12.5).is_ok());
        assert!(validate_amount("price", -1.0).is_err());
        assert!(validate_amount("cost", f64::NAN).is_err());
        assert!(validate_amount("cost", f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_units() {
        assert!(validate_units(1).is_ok());
        assert!(validate_units(0).is_err());
    }
}
