//! # harvest-core: Pure Types and Decoding for Harvest Mirror
//!
//! Everything the sync engine needs that does not touch the network or the
//! database: row types, vendor payload decoding, the AEMP telemetry decoder,
//! token refresh arithmetic, the resource dependency graph, and spray
//! derivation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Harvest Mirror Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Dashboard (external, HTTP JSON)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  apps/harvest-api (axum)                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        harvest-sync (auth, vendor client, handlers, engine)     │   │
//! │  └───────────────┬─────────────────────────────┬───────────────────┘   │
//! │                  │                             │                        │
//! │  ┌───────────────▼─────────────────┐  ┌────────▼──────────────────┐    │
//! │  │   ★ harvest-core (THIS CRATE) ★ │  │  harvest-db (SQLite)      │    │
//! │  │                                 │◄─│  repositories, migrations │    │
//! │  │  types  machine  vendor         │  └───────────────────────────┘    │
//! │  │  telemetry  token  resource     │                                   │
//! │  │  spray  error                   │                                   │
//! │  │                                 │                                   │
//! │  │  NO I/O • NO DATABASE • NO NET  │                                   │
//! │  └─────────────────────────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Mirror rows for the organization hierarchy, equipment, catalogs
//! - [`machine`] - Equipment-scoped time series, alerts, implements
//! - [`vendor`] - JSON payload → row decoders with shared defaulting rules
//! - [`telemetry`] - AEMP XML fleet decoder driven by a field-mapping table
//! - [`token`] - When a stored access token must be refreshed
//! - [`resource`] - Resource kinds, their dependency DAG, readable tables
//! - [`spray`] - Spray derivation and chemical inventory
//! - [`error`] - Decode errors
//!
//! ## Example Usage
//!
//! ```rust
//! use harvest_core::resource::{ResourceGraph, ResourceKind};
//!
//! let plan = ResourceGraph::default().plan().unwrap();
//! assert_eq!(plan[0], ResourceKind::Organizations);
//! assert_eq!(plan.len(), 18);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod machine;
pub mod resource;
pub mod spray;
pub mod telemetry;
pub mod token;
pub mod types;
pub mod vendor;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult};
pub use machine::*;
pub use resource::{DataTable, ResourceGraph, ResourceKind};
pub use spray::{
    ChemicalInventoryItem, InventoryItemStatus, InventoryUpdate, ManualSprayLog,
    NewSprayApplication, SprayApplication, SpraySource,
};
pub use telemetry::FleetTelemetry;
pub use token::RefreshPolicy;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// `sync_type` of orchestrated runs in the sync log.
pub const FULL_SYNC_TYPE: &str = "full";
