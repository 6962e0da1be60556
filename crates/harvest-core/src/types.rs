//! # Mirror Row Types
//!
//! Rows of the local mirror. Every mirrored entity is keyed by the vendor's
//! identifier and keeps the verbatim payload in `raw_data` so fields the
//! mirror does not model yet are never lost.
//!
//! ## Ownership Tree
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Mirror Entities                                 │
//! │                                                                         │
//! │  Organization ─┬── Farm                                                 │
//! │                ├── Field ──┬── Boundary                                 │
//! │                │           └── FieldOperation ──► SprayApplication      │
//! │                ├── Product / Operator / Flag                             │
//! │                ├── Implement ◄── ImplementAttachment ──┐                │
//! │                └── Equipment ──────────────────────────┘                │
//! │                       ├── location history / breadcrumbs               │
//! │                       └── measurements / alerts / device states /      │
//! │                           engine hours / operational hours (machine.rs)│
//! │                                                                         │
//! │  Credential (single active row)      SyncLogEntry (append-only)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

// =============================================================================
// Credential
// =============================================================================

/// The single active OAuth2 credential.
///
/// Only the token lifecycle manager (refresh) and the authorization-code
/// exchange (first connect) write this row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Credential {
    pub id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    /// Space separated scopes granted by the server.
    pub scopes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    /// Returns true once the expiry instant has passed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// A token endpoint response (authorization-code or refresh grant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Absent when the server does not rotate the refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

// =============================================================================
// Organization Hierarchy
// =============================================================================

/// Whether the organization has granted this client access to its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// The payload carries a `connections` link: access must still be granted.
    Pending,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub org_type: String,
    pub connection_status: ConnectionStatus,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Farm {
    pub id: String,
    pub org_id: String,
    pub name: String,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Field {
    pub id: String,
    pub org_id: String,
    pub farm_id: Option<String>,
    pub name: String,
    pub acreage: f64,
    pub crop_type: String,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

/// A single vertex of a boundary ring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Boundary geometry normalized to closed point rings.
///
/// Polygons, multipolygons and rectangular extents all collapse to this
/// shape so the map layer only ever draws `rings`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BoundaryGeometry {
    pub rings: Vec<Vec<GeoPoint>>,
}

impl BoundaryGeometry {
    pub fn is_empty(&self) -> bool {
        self.rings.iter().all(|ring| ring.is_empty())
    }

    pub fn point_count(&self) -> usize {
        self.rings.iter().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Boundary {
    pub id: String,
    pub field_id: String,
    pub org_id: String,
    pub name: String,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub geometry: BoundaryGeometry,
    pub acreage: f64,
    pub active: bool,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

// =============================================================================
// Equipment
// =============================================================================

/// A machine, merged from two sources.
///
/// ```text
/// JSON API (/equipment, /machines)      AEMP feed (/Fleet/{n})
/// ────────────────────────────────      ──────────────────────
/// name, make, model, type, serial       operating/idle hours, fuel used,
/// engine_hours, org_id (fallback)       fuel/DEF ratios, distance,
/// raw_data                              last location, telemetry_synced_at
/// ```
/// Each path only ever overwrites its own columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Equipment {
    pub id: String,
    /// Present only when the row came through the per-organization path.
    pub org_id: Option<String>,
    pub name: String,
    pub make: String,
    pub model: String,
    pub equipment_type: String,
    pub serial_number: String,
    pub engine_hours: f64,
    pub operating_hours: Option<f64>,
    pub idle_hours: Option<f64>,
    pub fuel_used: Option<f64>,
    /// Clamped to [0, 1].
    pub fuel_remaining_ratio: Option<f64>,
    /// Clamped to [0, 1].
    pub def_remaining_ratio: Option<f64>,
    pub distance: Option<f64>,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_location_at: Option<DateTime<Utc>>,
    pub telemetry_synced_at: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

// =============================================================================
// Operations & Catalogs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct FieldOperation {
    pub id: String,
    pub field_id: String,
    pub org_id: String,
    pub operation_type: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub area: f64,
    /// Applied products exactly as the vendor embeds them (JSON array).
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub products: Value,
    /// Measurement types keyed by name (JSON object).
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub measurements: Value,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

/// Catalog a product is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Variety,
    Chemical,
    Fertilizer,
}

impl ProductType {
    /// All catalogs, in sync order.
    pub const ALL: [ProductType; 3] = [
        ProductType::Variety,
        ProductType::Chemical,
        ProductType::Fertilizer,
    ];

    /// Vendor collection segment: `/organizations/{org}/{segment}`.
    pub fn endpoint_segment(&self) -> &'static str {
        match self {
            ProductType::Variety => "varieties",
            ProductType::Chemical => "chemicals",
            ProductType::Fertilizer => "fertilizers",
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductType::Variety => write!(f, "variety"),
            ProductType::Chemical => write!(f, "chemical"),
            ProductType::Fertilizer => write!(f, "fertilizer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub product_type: ProductType,
    pub manufacturer: String,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Operator {
    pub id: String,
    pub org_id: String,
    pub name: String,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Flag {
    pub id: String,
    pub org_id: String,
    pub field_id: Option<String>,
    pub category: String,
    pub notes: String,
    pub latitude: f64,
    pub longitude: f64,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

// =============================================================================
// Sync Log
// =============================================================================

/// Status of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    InProgress,
    /// The run finished; individual steps may still carry errors.
    Completed,
    Failed,
}

/// One row of the append-only sync audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SyncLogEntry {
    pub id: String,
    /// `full` for orchestrated runs, otherwise the resource name.
    pub sync_type: String,
    pub status: SyncStatus,
    pub records_synced: i64,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
