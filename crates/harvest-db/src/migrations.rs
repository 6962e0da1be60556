//! # Database Migrations
//!
//! Embedded SQL migrations for the mirror.
//!
//! ```text
//! migrations/sqlite/
//! ├── 001_initial_schema.sql      credentials, org hierarchy, equipment,
//! │                               operations, catalogs, sync_log
//! ├── 002_machine_telemetry.sql   time series, alerts, implements
//! └── 003_inventory.sql           chemical inventory, spray ledger
//! ```
//!
//! Applied migrations are tracked in `_sqlx_migrations`; running them again
//! is a no-op. Existing files are never edited, new ones are appended.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Migrations embedded at compile time from `migrations/sqlite`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!(
        embedded = MIGRATOR.migrations.len(),
        "Checking for pending migrations"
    );

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(embedded, applied)` migration counts for health reporting.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};

    use super::*;

    #[tokio::test]
    async fn test_all_migrations_applied() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (total, applied) = migration_status(db.pool()).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(applied, 3);

        // Running again changes nothing.
        run_migrations(db.pool()).await.unwrap();
        let (_, applied) = migration_status(db.pool()).await.unwrap();
        assert_eq!(applied, 3);
    }
}
