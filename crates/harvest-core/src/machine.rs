//! # Machine Telemetry Types
//!
//! Equipment-scoped time series, alerts, and implements.
//!
//! Time series rows use a local integer id; their identity for upserts is
//! the `(equipment_id, timestamp)` pair, so re-syncing a window that was
//! already mirrored inserts nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

// =============================================================================
// Location Series
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LocationPoint {
    pub id: i64,
    pub equipment_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Breadcrumb {
    pub id: i64,
    pub equipment_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub heading: f64,
    pub recorded_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

// =============================================================================
// Machine Readings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MachineMeasurement {
    pub id: i64,
    pub equipment_id: String,
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub recorded_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MachineDeviceState {
    pub id: i64,
    pub equipment_id: String,
    pub state: String,
    pub recorded_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MachineEngineHours {
    pub id: i64,
    pub equipment_id: String,
    pub hours: f64,
    pub recorded_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MachineOperationalHours {
    pub id: i64,
    pub equipment_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_hours: f64,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

// =============================================================================
// Alerts
// =============================================================================

/// Alert severity as shown on the alerts board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl AlertSeverity {
    /// Maps vendor severity wording onto the board's five levels.
    ///
    /// Unrecognized or missing values are shown as `Info`.
    pub fn from_vendor(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" | "stop" | "red" => AlertSeverity::Critical,
            "high" | "warning" | "amber" | "yellow" => AlertSeverity::High,
            "medium" | "moderate" => AlertSeverity::Medium,
            "low" | "minor" => AlertSeverity::Low,
            _ => AlertSeverity::Info,
        }
    }
}

/// A machine alert with an active/resolved lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MachineAlert {
    pub id: String,
    pub equipment_id: String,
    pub alert_type: String,
    pub description: String,
    pub dtc_code: String,
    pub severity: AlertSeverity,
    /// False once the vendor reports an end time or marks it inactive.
    pub active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

// =============================================================================
// Implements
// =============================================================================

/// An organization-scoped implement.
///
/// The vendor does not guarantee an id, so rows carry a local `id` and are
/// upserted on `(org_id, natural_key)`, where the natural key is the first
/// of external id, serial number, or name that is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Implement {
    pub id: String,
    pub external_id: Option<String>,
    pub org_id: String,
    pub natural_key: String,
    pub name: String,
    pub implement_type: String,
    pub make: String,
    pub model: String,
    pub serial_number: String,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub raw_data: Value,
    pub synced_at: DateTime<Utc>,
}

/// An implement mounted on a machine for a period of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ImplementAttachment {
    pub id: String,
    pub implement_id: String,
    pub equipment_id: String,
    pub attached_at: DateTime<Utc>,
    /// `None` while the implement is still attached.
    pub detached_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_severity_mapping() {
        assert_eq!(AlertSeverity::from_vendor("CRITICAL"), AlertSeverity::Critical);
        assert_eq!(AlertSeverity::from_vendor("warning"), AlertSeverity::High);
        assert_eq!(AlertSeverity::from_vendor(" medium "), AlertSeverity::Medium);
        assert_eq!(AlertSeverity::from_vendor("low"), AlertSeverity::Low);
        assert_eq!(AlertSeverity::from_vendor(""), AlertSeverity::Info);
        assert_eq!(AlertSeverity::from_vendor("purple"), AlertSeverity::Info);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Critical < AlertSeverity::Info);
    }
}
