//! # Machine Repository
//!
//! Equipment-scoped time series and alerts.
//!
//! ```text
//!  table                         identity
//!  ──────────────────────────    ─────────────────────────────────
//!  equipment_location_history    (equipment_id, recorded_at)
//!  equipment_breadcrumbs         (equipment_id, recorded_at)
//!  machine_measurements          (equipment_id, name, recorded_at)
//!  machine_device_states         (equipment_id, recorded_at)
//!  machine_engine_hours          (equipment_id, recorded_at)
//!  machine_operational_hours     (equipment_id, start_time)
//!  machine_alerts                id
//! ```
//!
//! Every write is an upsert on the identity, so re-syncing a window that is
//! already mirrored leaves row counts unchanged.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::error::DbResult;
use harvest_core::vendor::{
    BreadcrumbReading, DeviceStateReading, EngineHoursReading, LocationReading,
    MeasurementReading, OperationalHoursReading,
};
use harvest_core::{LocationPoint, MachineAlert};

#[derive(Debug, Clone)]
pub struct MachineRepository {
    pool: SqlitePool,
}

impl MachineRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MachineRepository { pool }
    }

    // =========================================================================
    // Location Series
    // =========================================================================

    pub async fn upsert_location(
        &self,
        equipment_id: &str,
        reading: &LocationReading,
        synced_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO equipment_location_history
                (equipment_id, latitude, longitude, recorded_at, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(equipment_id, recorded_at) DO UPDATE SET
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(equipment_id)
        .bind(reading.latitude)
        .bind(reading.longitude)
        .bind(reading.recorded_at)
        .bind(Json(&reading.raw))
        .bind(synced_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_locations(&self, equipment_id: &str) -> DbResult<Vec<LocationPoint>> {
        let points = sqlx::query_as::<_, LocationPoint>(
            r#"
            SELECT id, equipment_id, latitude, longitude, recorded_at, raw_data, synced_at
            FROM equipment_location_history
            WHERE equipment_id = ?1
            ORDER BY recorded_at DESC
            "#,
        )
        .bind(equipment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(points)
    }

    pub async fn upsert_breadcrumb(
        &self,
        equipment_id: &str,
        reading: &BreadcrumbReading,
        synced_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO equipment_breadcrumbs
                (equipment_id, latitude, longitude, speed, heading, recorded_at, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(equipment_id, recorded_at) DO UPDATE SET
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                speed = excluded.speed,
                heading = excluded.heading,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(equipment_id)
        .bind(reading.latitude)
        .bind(reading.longitude)
        .bind(reading.speed)
        .bind(reading.heading)
        .bind(reading.recorded_at)
        .bind(Json(&reading.raw))
        .bind(synced_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Machine Readings
    // =========================================================================

    pub async fn upsert_measurement(
        &self,
        equipment_id: &str,
        reading: &MeasurementReading,
        synced_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO machine_measurements
                (equipment_id, name, value, unit, recorded_at, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(equipment_id, name, recorded_at) DO UPDATE SET
                value = excluded.value,
                unit = excluded.unit,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(equipment_id)
        .bind(&reading.name)
        .bind(reading.value)
        .bind(&reading.unit)
        .bind(reading.recorded_at)
        .bind(Json(&reading.raw))
        .bind(synced_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_device_state(
        &self,
        equipment_id: &str,
        reading: &DeviceStateReading,
        synced_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO machine_device_states (equipment_id, state, recorded_at, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(equipment_id, recorded_at) DO UPDATE SET
                state = excluded.state,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(equipment_id)
        .bind(&reading.state)
        .bind(reading.recorded_at)
        .bind(Json(&reading.raw))
        .bind(synced_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_engine_hours(
        &self,
        equipment_id: &str,
        reading: &EngineHoursReading,
        synced_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO machine_engine_hours (equipment_id, hours, recorded_at, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(equipment_id, recorded_at) DO UPDATE SET
                hours = excluded.hours,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(equipment_id)
        .bind(reading.hours)
        .bind(reading.recorded_at)
        .bind(Json(&reading.raw))
        .bind(synced_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_operational_hours(
        &self,
        equipment_id: &str,
        reading: &OperationalHoursReading,
        synced_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO machine_operational_hours
                (equipment_id, start_time, end_time, duration_hours, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(equipment_id, start_time) DO UPDATE SET
                end_time = excluded.end_time,
                duration_hours = excluded.duration_hours,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(equipment_id)
        .bind(reading.start_time)
        .bind(reading.end_time)
        .bind(reading.duration_hours)
        .bind(Json(&reading.raw))
        .bind(synced_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Alerts
    // =========================================================================

    /// Upserts an alert; a later sync may resolve it (active → false).
    pub async fn upsert_alert(&self, alert: &MachineAlert) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO machine_alerts
                (id, equipment_id, alert_type, description, dtc_code, severity, active,
                 started_at, ended_at, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                equipment_id = excluded.equipment_id,
                alert_type = excluded.alert_type,
                description = excluded.description,
                dtc_code = excluded.dtc_code,
                severity = excluded.severity,
                active = excluded.active,
                started_at = excluded.started_at,
                ended_at = excluded.ended_at,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.equipment_id)
        .bind(&alert.alert_type)
        .bind(&alert.description)
        .bind(&alert.dtc_code)
        .bind(alert.severity)
        .bind(alert.active)
        .bind(alert.started_at)
        .bind(alert.ended_at)
        .bind(Json(&alert.raw_data))
        .bind(alert.synced_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Active alerts, most severe first.
    pub async fn list_active_alerts(&self) -> DbResult<Vec<MachineAlert>> {
        let alerts = sqlx::query_as::<_, MachineAlert>(
            r#"
            SELECT id, equipment_id, alert_type, description, dtc_code, severity, active,
                   started_at, ended_at, raw_data, synced_at
            FROM machine_alerts
            WHERE active = 1
            ORDER BY CASE severity
                WHEN 'critical' THEN 0 WHEN 'high' THEN 1 WHEN 'medium' THEN 2
                WHEN 'low' THEN 3 ELSE 4 END,
                started_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(alerts)
    }
}
