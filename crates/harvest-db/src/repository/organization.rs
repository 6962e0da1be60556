//! # Organization Repository
//!
//! Organizations and their farms. Both are upserted by the vendor id, so a
//! re-sync of unchanged data only refreshes `synced_at`.

use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use harvest_core::{Farm, Organization};

#[derive(Debug, Clone)]
pub struct OrganizationRepository {
    pool: SqlitePool,
}

impl OrganizationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrganizationRepository { pool }
    }

    // =========================================================================
    // Organizations
    // =========================================================================

    pub async fn upsert(&self, org: &Organization) -> DbResult<()> {
        debug!(org_id = %org.id, status = ?org.connection_status, "Upserting organization");

        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, org_type, connection_status, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                org_type = excluded.org_type,
                connection_status = excluded.connection_status,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&org.id)
        .bind(&org.name)
        .bind(&org.org_type)
        .bind(org.connection_status)
        .bind(Json(&org.raw_data))
        .bind(org.synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All mirrored organizations, by name.
    pub async fn list(&self) -> DbResult<Vec<Organization>> {
        let orgs = sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, org_type, connection_status, raw_data, synced_at
            FROM organizations
            ORDER BY name, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(orgs)
    }

    // =========================================================================
    // Farms
    // =========================================================================

    pub async fn upsert_farm(&self, farm: &Farm) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO farms (id, org_id, name, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                org_id = excluded.org_id,
                name = excluded.name,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&farm.id)
        .bind(&farm.org_id)
        .bind(&farm.name)
        .bind(Json(&farm.raw_data))
        .bind(farm.synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_farms(&self, org_id: &str) -> DbResult<Vec<Farm>> {
        let farms = sqlx::query_as::<_, Farm>(
            r#"
            SELECT id, org_id, name, raw_data, synced_at
            FROM farms
            WHERE org_id = ?1
            ORDER BY name, id
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(farms)
    }
}
