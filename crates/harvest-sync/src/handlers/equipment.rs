//! Machines: the equipment list, fleet telemetry snapshots, implements.
//!
//! ## Equipment Fallback
//! ```text
//!   GET /equipment ──► Ok, non-empty ──► upsert (org_id untouched)
//!        │
//!        └─ error or empty ──► "Root endpoint failed: ..."
//!                              for org in organizations:
//!                                  GET /organizations/{org}/machines
//!                                  ──► upsert with org_id = org
//!                                  (failure: "Org {id}: ...")
//! ```

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use super::{fetch_parent, org_label, SyncContext, SyncReport};
use crate::error::SyncResult;
use harvest_core::vendor::ImplementRecord;
use harvest_core::{CoreError, Equipment, ResourceKind};

const ROOT_ENDPOINT: &str = "/equipment";
const FLEET_LABEL: &str = "Fleet feed";

pub async fn sync_equipment(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::Equipment);

    match ctx.client.fetch_all_pages(ROOT_ENDPOINT, ctx.token).await {
        Ok(page) if !page.records.is_empty() => {
            upsert_machines(ctx, &mut report, &page.records, None, "Equipment").await?;
        }
        outcome => {
            let reason = match outcome {
                Err(e) => e.to_string(),
                Ok(_) => "no equipment returned".to_string(),
            };
            warn!(%reason, "Root equipment endpoint unusable, falling back to organizations");
            report.errors.push(format!("Root endpoint failed: {}", reason));

            for org in ctx.db.organizations().list().await? {
                let label = org_label(&org.id);
                let endpoint = format!("/organizations/{}/machines", org.id);
                if let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await {
                    upsert_machines(ctx, &mut report, &records, Some(&org.id), &label).await?;
                }
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Equipment synced");
    Ok(report)
}

async fn upsert_machines(
    ctx: SyncContext<'_>,
    report: &mut SyncReport,
    records: &[Value],
    org_id: Option<&str>,
    label: &str,
) -> SyncResult<()> {
    let repo = ctx.db.equipment();
    let now = Utc::now();
    for raw in records {
        match Equipment::from_vendor(raw, org_id, now) {
            Ok(equipment) => {
                repo.upsert(&equipment).await?;
                report.synced += 1;
            }
            Err(e) => report.skipped(label, &e),
        }
    }
    Ok(())
}

/// Merges the AEMP fleet feed into equipment rows.
///
/// Telemetry columns are overwritten on every run; descriptive columns are
/// only filled for machines first seen through the feed.
pub async fn sync_telemetry_snapshot(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::TelemetrySnapshot);
    let repo = ctx.db.equipment();

    match ctx.client.fetch_fleet_telemetry(ctx.token).await {
        Ok(fleet) => {
            let now = Utc::now();
            for snapshot in &fleet.equipment {
                if snapshot.equipment_id.is_empty() {
                    report.skipped(FLEET_LABEL, &CoreError::missing_id("fleet equipment"));
                    continue;
                }
                repo.merge_telemetry(snapshot, now).await?;
                report.synced += 1;
            }
        }
        Err(e) => report.parent_failed(FLEET_LABEL, &e),
    }

    info!(synced = report.synced, errors = report.errors.len(), "Telemetry snapshot synced");
    Ok(report)
}

/// Implements of every organization, with their current attachment.
pub async fn sync_implements(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::Implements);
    let repo = ctx.db.implements();

    for org in ctx.db.organizations().list().await? {
        let label = org_label(&org.id);
        let endpoint = format!("/organizations/{}/implements", org.id);
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        for raw in &records {
            let record = match ImplementRecord::from_vendor(raw) {
                Ok(record) => record,
                Err(e) => {
                    report.skipped(&label, &e);
                    continue;
                }
            };
            let implement_id = repo.upsert(&org.id, &record, now).await?;
            repo.sync_attachment(&implement_id, record.attached_equipment_id.as_deref(), now)
                .await?;
            report.synced += 1;
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Implements synced");
    Ok(report)
}
