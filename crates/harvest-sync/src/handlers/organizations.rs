//! Organization-scoped resources: organizations, farms, fields, boundaries,
//! products, operators, flags.

use chrono::Utc;
use tracing::info;

use super::{fetch_parent, field_label, org_label, SyncContext, SyncReport};
use crate::error::SyncResult;
use harvest_core::{Boundary, Farm, Field, Flag, Operator, Organization, Product, ProductType, ResourceKind};

const ROOT_LABEL: &str = "Organizations";

pub async fn sync_organizations(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::Organizations);
    let repo = ctx.db.organizations();

    if let Some(records) = fetch_parent(ctx, &mut report, ROOT_LABEL, "/organizations").await {
        let now = Utc::now();
        for raw in &records {
            match Organization::from_vendor(raw, now) {
                Ok(org) => {
                    repo.upsert(&org).await?;
                    report.synced += 1;
                }
                Err(e) => report.skipped(ROOT_LABEL, &e),
            }
        }
    }

    info!(synced = report.synced, "Organizations synced");
    Ok(report)
}

pub async fn sync_farms(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::Farms);
    let repo = ctx.db.organizations();

    for org in repo.list().await? {
        let label = org_label(&org.id);
        let endpoint = format!("/organizations/{}/farms", org.id);
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        for raw in &records {
            match Farm::from_vendor(raw, &org.id, now) {
                Ok(farm) => {
                    repo.upsert_farm(&farm).await?;
                    report.synced += 1;
                }
                Err(e) => report.skipped(&label, &e),
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Farms synced");
    Ok(report)
}

pub async fn sync_fields(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::Fields);
    let repo = ctx.db.fields();

    for org in ctx.db.organizations().list().await? {
        let label = org_label(&org.id);
        let endpoint = format!("/organizations/{}/fields", org.id);
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        for raw in &records {
            match Field::from_vendor(raw, &org.id, now) {
                Ok(field) => {
                    repo.upsert(&field).await?;
                    report.synced += 1;
                }
                Err(e) => report.skipped(&label, &e),
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Fields synced");
    Ok(report)
}

/// Boundaries of every locally mirrored field. With no fields mirrored
/// nothing is fetched.
pub async fn sync_boundaries(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::Boundaries);
    let repo = ctx.db.fields();

    for field in repo.list().await? {
        let label = field_label(&field.id);
        let endpoint = format!(
            "/organizations/{}/fields/{}/boundaries",
            field.org_id, field.id
        );
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        for raw in &records {
            match Boundary::from_vendor(raw, &field.id, &field.org_id, now) {
                Ok(boundary) => {
                    repo.upsert_boundary(&boundary).await?;
                    report.synced += 1;
                }
                Err(e) => report.skipped(&label, &e),
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Boundaries synced");
    Ok(report)
}

/// Varieties, chemicals and fertilizers of every organization.
pub async fn sync_products(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::Products);
    let repo = ctx.db.catalog();

    for org in ctx.db.organizations().list().await? {
        for product_type in ProductType::ALL {
            let label = format!("{} {}", org_label(&org.id), product_type.endpoint_segment());
            let endpoint = format!(
                "/organizations/{}/{}",
                org.id,
                product_type.endpoint_segment()
            );
            let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
                continue;
            };

            let now = Utc::now();
            for raw in &records {
                match Product::from_vendor(raw, &org.id, product_type, now) {
                    Ok(product) => {
                        repo.upsert_product(&product).await?;
                        report.synced += 1;
                    }
                    Err(e) => report.skipped(&label, &e),
                }
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Products synced");
    Ok(report)
}

pub async fn sync_operators(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::Operators);
    let repo = ctx.db.catalog();

    for org in ctx.db.organizations().list().await? {
        let label = org_label(&org.id);
        let endpoint = format!("/organizations/{}/operators", org.id);
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        for raw in &records {
            match Operator::from_vendor(raw, &org.id, now) {
                Ok(operator) => {
                    repo.upsert_operator(&operator).await?;
                    report.synced += 1;
                }
                Err(e) => report.skipped(&label, &e),
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Operators synced");
    Ok(report)
}

pub async fn sync_flags(ctx: SyncContext<'_>) -> SyncResult<SyncReport> {
    let mut report = SyncReport::new(ResourceKind::Flags);
    let repo = ctx.db.catalog();

    for org in ctx.db.organizations().list().await? {
        let label = org_label(&org.id);
        let endpoint = format!("/organizations/{}/flags", org.id);
        let Some(records) = fetch_parent(ctx, &mut report, &label, &endpoint).await else {
            continue;
        };

        let now = Utc::now();
        for raw in &records {
            match Flag::from_vendor(raw, &org.id, now) {
                Ok(flag) => {
                    repo.upsert_flag(&flag).await?;
                    report.synced += 1;
                }
                Err(e) => report.skipped(&label, &e),
            }
        }
    }

    info!(synced = report.synced, errors = report.errors.len(), "Flags synced");
    Ok(report)
}
