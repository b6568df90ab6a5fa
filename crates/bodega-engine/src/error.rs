//! # Engine Error Types
//!
//! What callers of the engine see.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Domain      │  │     Persistence         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Core(..)       │  │  Store(..)              │ │
//! │  │  MissingOrg     │  │  (validation,   │  │  (backend rejected or   │ │
//! │  │  ConfigLoad/Save│  │   duplicates)   │  │   unavailable)          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Change Feed    │  │     Cache       │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidEvent   │  │  CacheFailed    │  │  ChannelError           │ │
//! │  │  Deserialization│  │  Unsupported    │  │  ShuttingDown           │ │
//! │  │  Failed         │  │  CacheVersion   │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bodega_core::{CoreError, ValidationError};
use bodega_store::StoreError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// No organization configured; every backend call is scoped to one.
    #[error("Organization ID not configured")]
    MissingOrganization,

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// A domain rule rejected the operation before anything changed.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// The backend call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    // =========================================================================
    // Change Feed Errors
    // =========================================================================
    /// A change event was well-formed JSON but not a usable event.
    #[error("Invalid change event: {0}")]
    InvalidEvent(String),

    /// A change event or row payload could not be decoded.
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    // =========================================================================
    // Cache Errors
    // =========================================================================
    /// Reading or writing the cache file failed.
    #[error("Cache error: {0}")]
    CacheFailed(String),

    /// The cache file was written by an incompatible version.
    #[error("Unsupported cache version: {0}")]
    UnsupportedCacheVersion(u32),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// The reconciler is shutting down.
    #[error("Reconciler is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::DeserializationFailed(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    /// Returns true if retrying the same operation later could succeed.
    ///
    /// Only backend outages qualify; domain and config errors repeat.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Store(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidConfig(_)
                | EngineError::MissingOrganization
                | EngineError::ConfigLoadFailed(_)
                | EngineError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if the input was rejected before any state changed.
    pub fn is_rejected_input(&self) -> bool {
        matches!(
            self,
            EngineError::Core(CoreError::Validation(_))
                | EngineError::Core(CoreError::DuplicateProduct(_))
                | EngineError::Core(CoreError::ProductNotFound(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(EngineError::Store(StoreError::Unavailable("timeout".into())).is_retryable());
        assert!(!EngineError::Store(StoreError::duplicate("name", "Polar")).is_retryable());
        assert!(!EngineError::MissingOrganization.is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(EngineError::InvalidConfig("history".into()).is_config_error());
        assert!(!EngineError::ShuttingDown.is_config_error());
    }

    #[test]
    fn test_validation_converts_through_core() {
        let err: EngineError = ValidationError::Required {
            field: "name".into(),
        }
        .into();
        assert!(err.is_rejected_input());
        assert_eq!(err.to_string(), "Validation error: name is required");
    }
}
