//! # Field Repository
//!
//! Fields (organization-owned) and their boundaries. Boundary geometry is
//! stored as normalized ring JSON.

use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::error::DbResult;
use harvest_core::{Boundary, Field};

const SELECT_FIELD: &str = r#"
    SELECT id, org_id, farm_id, name, acreage, crop_type, raw_data, synced_at
    FROM fields
"#;

#[derive(Debug, Clone)]
pub struct FieldRepository {
    pool: SqlitePool,
}

impl FieldRepository {
    pub fn new(pool: SqlitePool) -> Self {
        FieldRepository { pool }
    }

    pub async fn upsert(&self, field: &Field) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fields (id, org_id, farm_id, name, acreage, crop_type, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                org_id = excluded.org_id,
                farm_id = excluded.farm_id,
                name = excluded.name,
                acreage = excluded.acreage,
                crop_type = excluded.crop_type,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&field.id)
        .bind(&field.org_id)
        .bind(&field.farm_id)
        .bind(&field.name)
        .bind(field.acreage)
        .bind(&field.crop_type)
        .bind(Json(&field.raw_data))
        .bind(field.synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fields of one organization.
    pub async fn list_for_org(&self, org_id: &str) -> DbResult<Vec<Field>> {
        let sql = format!("{} WHERE org_id = ?1 ORDER BY name, id", SELECT_FIELD);
        let fields = sqlx::query_as::<_, Field>(&sql)
            .bind(org_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(fields)
    }

    pub async fn list(&self) -> DbResult<Vec<Field>> {
        let sql = format!("{} ORDER BY org_id, name, id", SELECT_FIELD);
        let fields = sqlx::query_as::<_, Field>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(fields)
    }

    // =========================================================================
    // Boundaries
    // =========================================================================

    pub async fn upsert_boundary(&self, boundary: &Boundary) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO boundaries
                (id, field_id, org_id, name, geometry, acreage, active, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                field_id = excluded.field_id,
                org_id = excluded.org_id,
                name = excluded.name,
                geometry = excluded.geometry,
                acreage = excluded.acreage,
                active = excluded.active,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&boundary.id)
        .bind(&boundary.field_id)
        .bind(&boundary.org_id)
        .bind(&boundary.name)
        .bind(Json(&boundary.geometry))
        .bind(boundary.acreage)
        .bind(boundary.active)
        .bind(Json(&boundary.raw_data))
        .bind(boundary.synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_boundaries(&self, field_id: &str) -> DbResult<Vec<Boundary>> {
        let boundaries = sqlx::query_as::<_, Boundary>(
            r#"
            SELECT id, field_id, org_id, name, geometry, acreage, active, raw_data, synced_at
            FROM boundaries
            WHERE field_id = ?1
            ORDER BY active DESC, synced_at DESC
            "#,
        )
        .bind(field_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(boundaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use harvest_core::{BoundaryGeometry, ConnectionStatus, GeoPoint, Organization};
    use serde_json::json;

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.organizations()
            .upsert(&Organization {
                id: "o1".into(),
                name: "Acme".into(),
                org_type: String::new(),
                connection_status: ConnectionStatus::Connected,
                raw_data: json!({}),
                synced_at: Utc::now(),
            })
            .await
            .unwrap();
        db
    }

    fn field(id: &str, acreage: f64) -> Field {
        Field {
            id: id.into(),
            org_id: "o1".into(),
            farm_id: Some("fa1".into()),
            name: format!("Field {}", id),
            acreage,
            crop_type: "corn".into(),
            raw_data: json!({ "id": id }),
            synced_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_field_upsert_overwrites() {
        let db = seeded().await;
        let repo = db.fields();
        repo.upsert(&field("f1", 80.0)).await.unwrap();
        repo.upsert(&field("f1", 82.5)).await.unwrap();

        let fields = repo.list_for_org("o1").await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].acreage, 82.5);
        assert_eq!(fields[0].farm_id.as_deref(), Some("fa1"));
    }

    #[tokio::test]
    async fn test_boundary_geometry_round_trips() {
        let db = seeded().await;
        let repo = db.fields();
        repo.upsert(&field("f1", 80.0)).await.unwrap();

        let geometry = BoundaryGeometry {
            rings: vec![vec![
                GeoPoint { lat: 41.0, lon: -93.0 },
                GeoPoint { lat: 41.1, lon: -93.0 },
                GeoPoint { lat: 41.0, lon: -93.0 },
            ]],
        };
        repo.upsert_boundary(&Boundary {
            id: "b1".into(),
            field_id: "f1".into(),
            org_id: "o1".into(),
            name: "Main".into(),
            geometry: geometry.clone(),
            acreage: 79.9,
            active: true,
            raw_data: json!({}),
            synced_at: Utc::now(),
        })
        .await
        .unwrap();

        let stored = repo.list_boundaries("f1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].geometry, geometry);
        assert!(stored[0].active);
    }
}
