//! # Store Error Types
//!
//! Error types for calls to the persistence collaborator.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  Backend response { data, error }                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds context and categorization             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EngineError (bodega-engine) ← or a CommitFailure line in a report      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Persistence call errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found in the backend.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Creating a product whose name already exists in the organization
    #[error("Duplicate {field}: '{value}' already exists")]
    Conflict { field: String, value: String },

    /// The backend answered with an error payload.
    #[error("Backend rejected {operation}: {message}")]
    Rejected { operation: String, message: String },

    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// A row could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Conflict error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        StoreError::Conflict {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a Rejected error.
    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// True when retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result type for persistence calls.
pub type StoreResult<T> = Result<T, StoreError>;
