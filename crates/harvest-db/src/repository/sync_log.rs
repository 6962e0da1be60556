//! # Sync Log Repository
//!
//! Append-only audit trail: one row per resource sync and one `full` row per
//! orchestrated run. Rows are never updated after insert.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbResult;
use harvest_core::{SyncLogEntry, SyncStatus};

#[derive(Debug, Clone)]
pub struct SyncLogRepository {
    pool: SqlitePool,
}

impl SyncLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SyncLogRepository { pool }
    }

    /// Appends one row. `completed_at` is `None` for `in_progress` markers.
    pub async fn record(
        &self,
        sync_type: &str,
        status: SyncStatus,
        records_synced: i64,
        error_message: Option<&str>,
        started_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> DbResult<SyncLogEntry> {
        let entry = SyncLogEntry {
            id: Uuid::new_v4().to_string(),
            sync_type: sync_type.to_string(),
            status,
            records_synced,
            error_message: error_message.map(str::to_string),
            started_at,
            completed_at,
        };

        sqlx::query(
            r#"
            INSERT INTO sync_log
                (id, sync_type, status, records_synced, error_message, started_at, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.sync_type)
        .bind(entry.status)
        .bind(entry.records_synced)
        .bind(&entry.error_message)
        .bind(entry.started_at)
        .bind(entry.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Most recent runs first.
    pub async fn recent(&self, limit: i64) -> DbResult<Vec<SyncLogEntry>> {
        let entries = sqlx::query_as::<_, SyncLogEntry>(
            r#"
            SELECT id, sync_type, status, records_synced, error_message, started_at, completed_at
            FROM sync_log
            ORDER BY started_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    pub async fn count_by_type(&self, sync_type: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_log WHERE sync_type = ?1")
            .bind(sync_type)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;

    #[tokio::test]
    async fn test_record_and_recent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.sync_log();
        let t0 = Utc::now();

        repo.record("fields", SyncStatus::Completed, 12, None, t0, Some(t0))
            .await
            .unwrap();
        repo.record(
            "full",
            SyncStatus::Failed,
            0,
            Some("network error"),
            t0 + Duration::seconds(5),
            Some(t0 + Duration::seconds(6)),
        )
        .await
        .unwrap();

        let recent = repo.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].sync_type, "full");
        assert_eq!(recent[0].status, SyncStatus::Failed);
        assert_eq!(recent[0].error_message.as_deref(), Some("network error"));
        assert_eq!(recent[1].records_synced, 12);

        assert_eq!(repo.count_by_type("fields").await.unwrap(), 1);
        assert_eq!(repo.recent(1).await.unwrap().len(), 1);
    }
}
