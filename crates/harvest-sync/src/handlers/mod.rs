//! # Resource Sync Handlers
//!
//! One handler per [`ResourceKind`]. Each one reads its parents from the
//! local mirror, fetches the parent-scoped endpoint, decodes every record
//! and upserts it.
//!
//! ## Handler Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for parent in db.<parents>():              (never re-fetched)          │
//! │      match client.fetch_all_pages(endpoint(parent)) {                   │
//! │          Err(e)   => report.parent_failed("Org 42", e)   ──► continue   │
//! │          Ok(page) => for raw in page.records {                          │
//! │                          decode ─┬─ Ok(row)  => upsert(row)?  synced+=1 │
//! │                                  └─ Err(e)   => report.skipped(e)       │
//! │                      }                                                  │
//! │      }                                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Upstream failures and undecodable records end up in the report; a
//! database failure aborts the handler with `Err`.

pub mod equipment;
pub mod machine;
pub mod operations;
pub mod organizations;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::VendorClient;
use crate::error::{SyncResult, UpstreamError};
use harvest_core::{CoreError, ResourceKind};
use harvest_db::Database;

/// Outcome of one handler run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub synced: usize,
    #[serde(rename = "type")]
    pub sync_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn new(kind: ResourceKind) -> Self {
        SyncReport {
            synced: 0,
            sync_type: kind.as_str().to_string(),
            errors: Vec::new(),
        }
    }

    /// A report for a handler that failed outright.
    pub fn failed(kind: ResourceKind, message: impl Into<String>) -> Self {
        let mut report = Self::new(kind);
        report.errors.push(message.into());
        report
    }

    /// Records a failed fetch for one parent as `"<label>: HTTP <status>: <message>"`.
    pub fn parent_failed(&mut self, label: &str, err: &UpstreamError) {
        warn!(resource = %self.sync_type, parent = %label, error = %err, "Parent fetch failed");
        self.errors.push(format!("{}: {}", label, err));
    }

    /// Records a record that could not be decoded.
    pub fn skipped(&mut self, label: &str, err: &CoreError) {
        warn!(resource = %self.sync_type, parent = %label, error = %err, "Record skipped");
        self.errors.push(format!("{}: {}", label, err));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Everything a handler needs for one run.
#[derive(Clone, Copy)]
pub struct SyncContext<'a> {
    pub db: &'a Database,
    pub client: &'a VendorClient,
    pub token: &'a str,
}

/// Fetches every page for one parent; a failure is recorded on `report`.
pub(crate) async fn fetch_parent(
    ctx: SyncContext<'_>,
    report: &mut SyncReport,
    label: &str,
    endpoint: &str,
) -> Option<Vec<Value>> {
    match ctx.client.fetch_all_pages(endpoint, ctx.token).await {
        Ok(page) => {
            debug!(resource = %report.sync_type, parent = %label, total = page.total, "Fetched records");
            Some(page.records)
        }
        Err(e) => {
            report.parent_failed(label, &e);
            None
        }
    }
}

pub(crate) fn org_label(org_id: &str) -> String {
    format!("Org {}", org_id)
}

pub(crate) fn field_label(field_id: &str) -> String {
    format!("Field {}", field_id)
}

pub(crate) fn machine_label(equipment_id: &str) -> String {
    format!("Machine {}", equipment_id)
}

/// Runs the handler for `kind`.
pub async fn run(kind: ResourceKind, ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    match kind {
        ResourceKind::Organizations => organizations::sync_organizations(ctx).await,
        ResourceKind::Farms => organizations::sync_farms(ctx).await,
        ResourceKind::Fields => organizations::sync_fields(ctx).await,
        ResourceKind::Boundaries => organizations::sync_boundaries(ctx).await,
        ResourceKind::Equipment => equipment::sync_equipment(ctx).await,
        ResourceKind::TelemetrySnapshot => equipment::sync_telemetry_snapshot(ctx).await,
        ResourceKind::LocationHistory => machine::sync_location_history(ctx).await,
        ResourceKind::Breadcrumbs => machine::sync_breadcrumbs(ctx).await,
        ResourceKind::FieldOperations => operations::sync_field_operations(ctx).await,
        ResourceKind::Products => organizations::sync_products(ctx).await,
        ResourceKind::Operators => organizations::sync_operators(ctx).await,
        ResourceKind::Flags => organizations::sync_flags(ctx).await,
        ResourceKind::Implements => equipment::sync_implements(ctx).await,
        ResourceKind::Measurements => machine::sync_measurements(ctx).await,
        ResourceKind::Alerts => machine::sync_alerts(ctx).await,
        ResourceKind::DeviceStates => machine::sync_device_states(ctx).await,
        ResourceKind::EngineHours => machine::sync_engine_hours(ctx).await,
        ResourceKind::OperationalHours => machine::sync_operational_hours(ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_serialization() {
        let mut report = SyncReport::new(ResourceKind::Fields);
        report.synced = 5;
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({ "synced": 5, "type": "fields" })
        );

        report.parent_failed(&org_label("A"), &UpstreamError::new(500, "boom"));
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({ "synced": 5, "type": "fields", "errors": ["Org A: HTTP 500: boom"] })
        );
    }
}
