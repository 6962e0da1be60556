//! # Equipment Repository
//!
//! One `equipment` row is written by two independent paths:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  upsert()            JSON API        name, make, model, type, serial,   │
//! │                                      engine_hours, raw_data, synced_at, │
//! │                                      org_id (only when supplied)        │
//! │                                                                         │
//! │  merge_telemetry()   AEMP feed       operating/idle hours, fuel used,   │
//! │                                      fuel/DEF ratios, distance, last    │
//! │                                      location, telemetry_synced_at      │
//! │                                                                         │
//! │  Neither statement's DO UPDATE touches the other path's columns.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A machine first seen through the feed is created with the feed's make,
//! model, and serial so it can be listed before the JSON sync runs.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use harvest_core::telemetry::clamp_ratio;
use harvest_core::{Equipment, FleetTelemetry};

const SELECT_EQUIPMENT: &str = r#"
    SELECT id, org_id, name, make, model, equipment_type, serial_number, engine_hours,
           operating_hours, idle_hours, fuel_used, fuel_remaining_ratio, def_remaining_ratio,
           distance, last_latitude, last_longitude, last_location_at, telemetry_synced_at,
           raw_data, synced_at
    FROM equipment
"#;

#[derive(Debug, Clone)]
pub struct EquipmentRepository {
    pool: SqlitePool,
}

impl EquipmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        EquipmentRepository { pool }
    }

    /// Upserts the descriptive columns decoded from the JSON API.
    ///
    /// A `None` org id never clears an org id stored by an earlier
    /// per-organization sync.
    pub async fn upsert(&self, equipment: &Equipment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO equipment
                (id, org_id, name, make, model, equipment_type, serial_number, engine_hours,
                 raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                org_id = COALESCE(excluded.org_id, equipment.org_id),
                name = excluded.name,
                make = excluded.make,
                model = excluded.model,
                equipment_type = excluded.equipment_type,
                serial_number = excluded.serial_number,
                engine_hours = excluded.engine_hours,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&equipment.id)
        .bind(&equipment.org_id)
        .bind(&equipment.name)
        .bind(&equipment.make)
        .bind(&equipment.model)
        .bind(&equipment.equipment_type)
        .bind(&equipment.serial_number)
        .bind(equipment.engine_hours)
        .bind(Json(&equipment.raw_data))
        .bind(equipment.synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Writes one AEMP snapshot. Telemetry columns are last-write-wins.
    ///
    /// ## Arguments
    /// * `snapshot` - Decoded `<Equipment>` block; `equipment_id` must be non-empty
    /// * `synced_at` - Time of this telemetry sync
    pub async fn merge_telemetry(
        &self,
        snapshot: &FleetTelemetry,
        synced_at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(
            equipment_id = %snapshot.equipment_id,
            fuel_ratio = snapshot.fuel_remaining_ratio,
            "Merging telemetry snapshot"
        );

        sqlx::query(
            r#"
            INSERT INTO equipment
                (id, name, make, model, serial_number,
                 operating_hours, idle_hours, fuel_used, fuel_remaining_ratio,
                 def_remaining_ratio, distance, last_latitude, last_longitude,
                 last_location_at, telemetry_synced_at, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
            ON CONFLICT(id) DO UPDATE SET
                operating_hours = excluded.operating_hours,
                idle_hours = excluded.idle_hours,
                fuel_used = excluded.fuel_used,
                fuel_remaining_ratio = excluded.fuel_remaining_ratio,
                def_remaining_ratio = excluded.def_remaining_ratio,
                distance = excluded.distance,
                last_latitude = excluded.last_latitude,
                last_longitude = excluded.last_longitude,
                last_location_at = excluded.last_location_at,
                telemetry_synced_at = excluded.telemetry_synced_at
            "#,
        )
        .bind(&snapshot.equipment_id)
        .bind(snapshot.display_name())
        .bind(&snapshot.make)
        .bind(&snapshot.model)
        .bind(&snapshot.serial_number)
        .bind(snapshot.operating_hours)
        .bind(snapshot.idle_hours)
        .bind(snapshot.fuel_used)
        .bind(clamp_ratio(snapshot.fuel_remaining_ratio))
        .bind(clamp_ratio(snapshot.def_remaining_ratio))
        .bind(snapshot.distance)
        .bind(snapshot.latitude)
        .bind(snapshot.longitude)
        .bind(snapshot.location_at)
        .bind(synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Moves the last known location forward when `recorded_at` is newer
    /// than the stored one.
    ///
    /// ## Returns
    /// * `true` - the location was advanced
    pub async fn update_last_location(
        &self,
        id: &str,
        latitude: f64,
        longitude: f64,
        recorded_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE equipment
            SET last_latitude = ?2, last_longitude = ?3, last_location_at = ?4
            WHERE id = ?1 AND (last_location_at IS NULL OR last_location_at < ?4)
            "#,
        )
        .bind(id)
        .bind(latitude)
        .bind(longitude)
        .bind(recorded_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Equipment>> {
        let sql = format!("{} WHERE id = ?1", SELECT_EQUIPMENT);
        let equipment = sqlx::query_as::<_, Equipment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(equipment)
    }

    /// All machines, by name.
    pub async fn list(&self) -> DbResult<Vec<Equipment>> {
        let sql = format!("{} ORDER BY name, id", SELECT_EQUIPMENT);
        let equipment = sqlx::query_as::<_, Equipment>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(equipment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn json_machine(org_id: Option<&str>) -> Equipment {
        Equipment {
            id: "eq-1".into(),
            org_id: org_id.map(str::to_string),
            name: "Big Green".into(),
            make: "Deere".into(),
            model: "8R 410".into(),
            equipment_type: "Tractor".into(),
            serial_number: "1RW8410".into(),
            engine_hours: 1520.0,
            operating_hours: None,
            idle_hours: None,
            fuel_used: None,
            fuel_remaining_ratio: None,
            def_remaining_ratio: None,
            distance: None,
            last_latitude: None,
            last_longitude: None,
            last_location_at: None,
            telemetry_synced_at: None,
            raw_data: json!({ "id": "eq-1" }),
            synced_at: Utc::now(),
        }
    }

    fn snapshot(fuel: f64) -> FleetTelemetry {
        FleetTelemetry {
            equipment_id: "eq-1".into(),
            make: "JD".into(),
            model: "8R".into(),
            fuel_remaining_ratio: fuel,
            operating_hours: 1600.0,
            ..FleetTelemetry::default()
        }
    }

    #[tokio::test]
    async fn test_telemetry_merge_keeps_descriptive_columns() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.equipment();

        repo.upsert(&json_machine(None)).await.unwrap();
        repo.merge_telemetry(&snapshot(0.42), Utc::now()).await.unwrap();

        let stored = repo.get("eq-1").await.unwrap().unwrap();
        assert_eq!(stored.make, "Deere");
        assert_eq!(stored.name, "Big Green");
        assert_eq!(stored.fuel_remaining_ratio, Some(0.42));
        assert_eq!(stored.operating_hours, Some(1600.0));
        assert!(stored.telemetry_synced_at.is_some());

        // A later JSON sync does not clear telemetry.
        repo.upsert(&json_machine(None)).await.unwrap();
        let stored = repo.get("eq-1").await.unwrap().unwrap();
        assert_eq!(stored.fuel_remaining_ratio, Some(0.42));
    }

    #[tokio::test]
    async fn test_feed_creates_unknown_machine() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.equipment();
        repo.merge_telemetry(&snapshot(1.7), Utc::now()).await.unwrap();

        let stored = repo.get("eq-1").await.unwrap().unwrap();
        assert_eq!(stored.name, "JD 8R");
        assert_eq!(stored.fuel_remaining_ratio, Some(1.0));
        assert_eq!(stored.raw_data, json!({}));
    }

    #[tokio::test]
    async fn test_org_id_is_never_cleared() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.equipment();
        repo.upsert(&json_machine(Some("o1"))).await.unwrap();
        repo.upsert(&json_machine(None)).await.unwrap();

        let stored = repo.get("eq-1").await.unwrap().unwrap();
        assert_eq!(stored.org_id.as_deref(), Some("o1"));
    }

    #[tokio::test]
    async fn test_last_location_only_advances() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.equipment();
        repo.upsert(&json_machine(None)).await.unwrap();

        let t0 = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        assert!(repo.update_last_location("eq-1", 41.0, -93.0, t0).await.unwrap());
        assert!(!repo
            .update_last_location("eq-1", 40.0, -92.0, t0 - Duration::hours(1))
            .await
            .unwrap());

        let stored = repo.get("eq-1").await.unwrap().unwrap();
        assert_eq!(stored.last_latitude, Some(41.0));
        assert_eq!(stored.last_location_at, Some(t0));
    }
}
