//! # harvest-sync: Sync Engine for Harvest Mirror
//!
//! Keeps the local mirror of the vendor's farm-management data fresh.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Sync Engine Architecture                       │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    SyncEngine (Main Orchestrator)                │  │
//! │  │                                                                  │  │
//! │  │  Run guard, ResourceGraph plan, sync_log entries                 │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  AuthManager   │  │  VendorClient  │  │  handlers/             │    │
//! │  │                │  │                │  │                        │    │
//! │  │ OAuth2 code    │  │ nextPage chain │  │ One per resource:      │    │
//! │  │ exchange and   │  │ all-or-nothing │  │ parents from the DB,   │    │
//! │  │ refresh under  │  │ AEMP /Fleet/n  │  │ decode, upsert, report │    │
//! │  │ one mutex      │  │ XML feed       │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  harvest-db repositories receive every upsert; nothing is cached here. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`auth`] - Credential store seam and `AuthManager`
//! - [`client`] - Paginated JSON fetch and AEMP feed fetch
//! - [`config`] - `HarvestConfig` (TOML + `HARVEST_*` env)
//! - [`engine`] - `SyncEngine` orchestrator
//! - [`error`] - Sync error types
//! - [`handlers`] - Resource sync handlers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use harvest_sync::{HarvestConfig, SyncEngine};
//! use harvest_db::{Database, DbConfig};
//!
//! let config = HarvestConfig::load_or_default(None);
//! let db = Database::new(DbConfig::new(&config.database.path)).await?;
//! let engine = SyncEngine::new(&config, db)?;
//!
//! let report = engine.sync_all().await?;
//! println!("Synced {} records", report.total_synced());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::{AuthManager, AuthStatus, AuthorizationRequest, CredentialStore};
pub use client::{FleetPage, Page, VendorClient};
pub use config::{
    DatabaseSettings, HarvestConfig, OAuthSettings, ServerSettings, SyncSettings, VendorSettings,
};
pub use engine::{OrganizationAccess, SyncAllReport, SyncEngine};
pub use error::{SyncError, SyncResult, UpstreamError};
pub use handlers::{SyncContext, SyncReport};
