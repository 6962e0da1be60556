//! # Repository Module
//!
//! One repository per table family. Each holds a clone of the pool and is
//! handed out by [`Database`](crate::Database).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sync handler                                                           │
//! │       │                                                                 │
//! │       │  db.fields().upsert(&field)                                     │
//! │       ▼                                                                 │
//! │  FieldRepository ── INSERT ... ON CONFLICT(id) DO UPDATE ──► SQLite     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CredentialRepository`] - The single active OAuth2 credential
//! - [`OrganizationRepository`] - Organizations and farms
//! - [`FieldRepository`] - Fields and boundaries
//! - [`EquipmentRepository`] - Machines (JSON columns + telemetry merge)
//! - [`OperationRepository`] - Field operations
//! - [`CatalogRepository`] - Products, operators, flags
//! - [`MachineRepository`] - Equipment time series and alerts
//! - [`ImplementRepository`] - Implements and attachment history
//! - [`SyncLogRepository`] - Append-only sync audit trail
//! - [`InventoryRepository`] - Chemical inventory and spray ledger
//! - [`TableReader`] - Read-only dashboard access to every table

pub mod catalog;
pub mod credential;
pub mod equipment;
pub mod field;
pub mod implement;
pub mod inventory;
pub mod machine;
pub mod operation;
pub mod organization;
pub mod reader;
pub mod sync_log;

pub use catalog::CatalogRepository;
pub use credential::CredentialRepository;
pub use equipment::EquipmentRepository;
pub use field::FieldRepository;
pub use implement::ImplementRepository;
pub use inventory::InventoryRepository;
pub use machine::MachineRepository;
pub use operation::OperationRepository;
pub use organization::OrganizationRepository;
pub use reader::{TablePage, TableReader, MAX_PAGE_ROWS};
pub use sync_log::SyncLogRepository;
