//! Per-machine time series and alerts.
//!
//! Every handler here walks the locally mirrored equipment and fetches
//! `/machines/{id}/<series>`. Series rows are keyed by their timestamp, so
//! re-running a handler rewrites the same rows.

use chrono::Utc;
use tracing::{debug, info};

use super::{fetch_parent, machine_label, SyncContext, SyncReport};
use crate::error::SyncResult;
use harvest_core::vendor::{
    BreadcrumbReading, DeviceStateReading, EngineHoursReading, LocationReading,
    MeasurementReading, OperationalHoursReading,
};
use harvest_core::{MachineAlert, ResourceKind};

/// Location history; also advances each machine's last known location to
/// its newest point.
pub async fn sync_location_history(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::LocationHistory);
    let machines = ctx.db.machines();
    let equipment = ctx.db.equipment();

    for machine in equipment.list().await? {
        let label = machine_label(&machine.id);
        let endpoint = format!("/machines/{}/locationHistory", machine.id);
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        let mut newest: Option<LocationReading> = None;
        for raw in &records {
            let reading = match LocationReading::from_vendor(raw) {
                Ok(reading) => reading,
                Err(e) => {
                    report.skipped(&label, &e);
                    continue;
                }
            };
            machines.upsert_location(&machine.id, &reading, now).await?;
            report.synced += 1;

            if newest
                .as_ref()
                .map_or(true, |n| reading.recorded_at > n.recorded_at)
            {
                newest = Some(reading);
            }
        }

        if let Some(point) = newest {
            let advanced = equipment
                .update_last_location(&machine.id, point.latitude, point.longitude, point.recorded_at)
                .await?;
            if advanced {
                debug!(equipment_id = %machine.id, at = %point.recorded_at, "Last location advanced");
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Location history synced");
    Ok(report)
}

pub async fn sync_breadcrumbs(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::Breadcrumbs);
    let machines = ctx.db.machines();

    for machine in ctx.db.equipment().list().await? {
        let label = machine_label(&machine.id);
        let endpoint = format!("/machines/{}/breadcrumbs", machine.id);
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        for raw in &records {
            match BreadcrumbReading::from_vendor(raw) {
                Ok(reading) => {
                    machines.upsert_breadcrumb(&machine.id, &reading, now).await?;
                    report.synced += 1;
                }
                Err(e) => report.skipped(&label, &e),
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Breadcrumbs synced");
    Ok(report)
}

pub async fn sync_measurements(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::Measurements);
    let machines = ctx.db.machines();

    for machine in ctx.db.equipment().list().await? {
        let label = machine_label(&machine.id);
        let endpoint = format!("/machines/{}/machineMeasurements", machine.id);
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        for raw in &records {
            match MeasurementReading::from_vendor(raw) {
                Ok(reading) => {
                    machines.upsert_measurement(&machine.id, &reading, now).await?;
                    report.synced += 1;
                }
                Err(e) => report.skipped(&label, &e),
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Measurements synced");
    Ok(report)
}

pub async fn sync_alerts(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::Alerts);
    let machines = ctx.db.machines();

    for machine in ctx.db.equipment().list().await? {
        let label = machine_label(&machine.id);
        let endpoint = format!("/machines/{}/alerts", machine.id);
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        for raw in &records {
            match MachineAlert::from_vendor(raw, &machine.id, now) {
                Ok(alert) => {
                    machines.upsert_alert(&alert).await?;
                    report.synced += 1;
                }
                Err(e) => report.skipped(&label, &e),
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Alerts synced");
    Ok(report)
}

pub async fn sync_device_states(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::DeviceStates);
    let machines = ctx.db.machines();

    for machine in ctx.db.equipment().list().await? {
        let label = machine_label(&machine.id);
        let endpoint = format!("/machines/{}/deviceStateReports", machine.id);
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        for raw in &records {
            match DeviceStateReading::from_vendor(raw) {
                Ok(reading) => {
                    machines.upsert_device_state(&machine.id, &reading, now).await?;
                    report.synced += 1;
                }
                Err(e) => report.skipped(&label, &e),
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Device states synced");
    Ok(report)
}

pub async fn sync_engine_hours(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::EngineHours);
    let machines = ctx.db.machines();

    for machine in ctx.db.equipment().list().await? {
        let label = machine_label(&machine.id);
        let endpoint = format!("/machines/{}/engineHours", machine.id);
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        for raw in &records {
            match EngineHoursReading::from_vendor(raw) {
                Ok(reading) => {
                    machines.upsert_engine_hours(&machine.id, &reading, now).await?;
                    report.synced += 1;
                }
                Err(e) => report.skipped(&label, &e),
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Engine hours synced");
    Ok(report)
}

pub async fn sync_operational_hours(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::OperationalHours);
    let machines = ctx.db.machines();

    for machine in ctx.db.equipment().list().await? {
        let label = machine_label(&machine.id);
        let endpoint = format!("/machines/{}/hoursOfOperation", machine.id);
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        for raw in &records {
            match OperationalHoursReading::from_vendor(raw) {
                Ok(reading) => {
                    machines
                        .upsert_operational_hours(&machine.id, &reading, now)
                        .await?;
                    report.synced += 1;
                }
                Err(e) => report.skipped(&label, &e),
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Operational hours synced");
    Ok(report)
}
