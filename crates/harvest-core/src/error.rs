//! # Error Types
//!
//! Domain-specific error types for harvest-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  harvest-core errors (this file)                                       │
//! │  └── CoreError        - Decode and parse failures                      │
//! │                                                                         │
//! │  harvest-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  harvest-sync errors (separate crate)                                  │
//! │  └── SyncError        - Auth, upstream, persistence, config            │
//! │                                                                         │
//! │  Flow: CoreError → (skipped record) → SyncReport.errors → Dashboard    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decoding is lenient: absent optional fields take defaults. The only
//! record-level failure is a record that cannot be keyed.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Decode and parse errors.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    /// A vendor record has no usable identifier and cannot be upserted.
    #[error("{resource} record has no id")]
    MissingId { resource: String },

    /// A keyed time-series record is missing the field that keys it.
    #[error("{resource} record is missing {field}")]
    MissingField { resource: String, field: String },

    /// A resource or table name that is not part of the mirror.
    ///
    /// ## When This Occurs
    /// - `/sync/{resource}` with an unknown resource
    /// - `/data/{table}` with an unknown table
    #[error("Unknown {kind}: '{name}'")]
    UnknownName { kind: String, name: String },

    /// The resource dependency graph contains a cycle.
    #[error("Dependency cycle detected among: {0:?}")]
    DependencyCycle(Vec<String>),
}

impl CoreError {
    /// Creates a MissingId error for a resource.
    pub fn missing_id(resource: impl Into<String>) -> Self {
        CoreError::MissingId {
            resource: resource.into(),
        }
    }

    /// Creates a MissingField error.
    pub fn missing_field(resource: impl Into<String>, field: impl Into<String>) -> Self {
        CoreError::MissingField {
            resource: resource.into(),
            field: field.into(),
        }
    }

    /// Creates an UnknownName error.
    pub fn unknown(kind: impl Into<String>, name: impl Into<String>) -> Self {
        CoreError::UnknownName {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
