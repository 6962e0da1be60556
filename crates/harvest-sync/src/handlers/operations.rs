//! Field operations and the spray applications derived from them.
//!
//! ```text
//!   fieldOperations ──► upsert FieldOperation
//!                           │
//!                           └─ type ~ spray|application?
//!                                 └─► one SprayApplication per named product
//!                                     (source = vendor, insert-if-absent)
//! ```

use chrono::Utc;
use tracing::{debug, info};

use super::{fetch_parent, field_label, SyncContext, SyncReport};
use crate::error::SyncResult;
use harvest_core::spray::derive_spray_applications;
use harvest_core::{FieldOperation, ResourceKind};

pub async fn sync_field_operations(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::FieldOperations);
    let operations = ctx.db.operations();
    let inventory = ctx.db.inventory();
    let mut derived = 0usize;

    for field in ctx.db.fields().list().await? {
        let label = field_label(&field.id);
        let endpoint = format!(
            "/organizations/{}/fields/{}/fieldOperations",
            field.org_id, field.id
        );
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        for raw in &records {
            let op = match FieldOperation::from_vendor(raw, &field.id, &field.org_id, now) {
                Ok(op) => op,
                Err(e) => {
                    report.skipped(&label, &e);
                    continue;
                }
            };
            operations.upsert(&op).await?;
            report.synced += 1;

            for application in derive_spray_applications(&op, now.date_naive()) {
                if inventory.insert_vendor_spray(&application).await? {
                    derived += 1;
                }
            }
        }
    }

    if derived > 0 {
        debug!(derived, "Recorded vendor spray applications");
    }
    info!(synced = report.synced, errors = report.errors.len(), "Field operations synced");
    Ok(report)
}
