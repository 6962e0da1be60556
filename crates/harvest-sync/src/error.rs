//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │      Auth       │  │       Upstream          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │ NotAuthenticated│  │  Upstream{status, msg}  │ │
//! │  │  InvalidUrl     │  │ TokenExchange-  │  │  (status 0 = transport) │ │
//! │  │  ConfigLoad/Save│  │   Failed        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Database     │  │     Decode      │  │      Orchestration      │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Database(DbErr)│  │  Core(CoreError)│  │  SyncInProgress         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Upstream failures inside a handler are folded into the handler's report;
//! only database failures abort a handler.

use harvest_core::CoreError;
use harvest_db::DbError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// A failed vendor request.
///
/// `status` is the HTTP status, or 0 when no response was received or the
/// body could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status}: {message}")]
pub struct UpstreamError {
    pub status: u16,
    pub message: String,
}

impl UpstreamError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        UpstreamError {
            status,
            message: message.into(),
        }
    }

    /// A failure without an HTTP response.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        UpstreamError::new(0, err.to_string())
    }

    /// The `{error, status, message}` body handed back by the proxy.
    pub fn descriptor(&self) -> serde_json::Value {
        serde_json::json!({
            "error": true,
            "status": self.status,
            "message": self.message,
        })
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        UpstreamError::transport(err)
    }
}

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid URL in configuration or request.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Auth Errors
    // =========================================================================
    /// No credential is stored, or it could not be refreshed.
    #[error("Not authenticated with the vendor")]
    NotAuthenticated,

    /// The token endpoint rejected a code exchange or refresh.
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    // =========================================================================
    // Upstream Errors
    // =========================================================================
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] UpstreamError),

    // =========================================================================
    // Decode / Persistence Errors
    // =========================================================================
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    // =========================================================================
    // Orchestration Errors
    // =========================================================================
    /// Another sync run holds the run guard.
    #[error("A sync run is already in progress")]
    SyncInProgress,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Upstream(UpstreamError::from(err))
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the caller has to (re)connect the vendor account.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SyncError::NotAuthenticated | SyncError::TokenExchangeFailed(_)
        )
    }

    /// Returns true if the vendor API failed or could not be reached.
    pub fn is_upstream(&self) -> bool {
        matches!(self, SyncError::Upstream(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
