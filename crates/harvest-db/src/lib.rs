//! # harvest-db: Local Mirror Storage
//!
//! SQLite persistence for the farm-data mirror, using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mirror Data Flow                                 │
//! │                                                                         │
//! │  harvest-sync handlers          harvest-api /data/{table}              │
//! │       │ upsert                        │ read                            │
//! │       ▼                               ▼                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     harvest-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │ (repository/) │    │  (embedded)  │   │   │
//! │  │   │               │    │               │    │              │   │   │
//! │  │   │ SqlitePool    │◄───│ EquipmentRepo │    │ 001_initial  │   │   │
//! │  │   │ WAL, FKs on   │    │ MachineRepo   │    │ 002_machine  │   │   │
//! │  │   │               │    │ TableReader   │    │ 003_inventory│   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   harvest.db (path from HarvestConfig)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per table family
//!
//! ## Usage
//!
//! ```rust,ignore
//! use harvest_db::{Database, DbConfig};
//! use harvest_core::DataTable;
//!
//! let db = Database::new(DbConfig::new("harvest.db")).await?;
//! let page = db.tables().read(DataTable::Equipment, 100).await?;
//! println!("{} machines", page.total);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::{
    CatalogRepository, CredentialRepository, EquipmentRepository, FieldRepository,
    ImplementRepository, InventoryRepository, MachineRepository, OperationRepository,
    OrganizationRepository, SyncLogRepository, TablePage, TableReader, MAX_PAGE_ROWS,
};
