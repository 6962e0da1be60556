//! # Table Reader
//!
//! Read-only view over every mirrored table for the dashboard.
//!
//! Rows are decoded into their typed entity first and serialized afterwards,
//! so JSON columns come back as JSON and timestamps as RFC 3339 strings.
//! Credentials are not a [`DataTable`] and cannot be read here.

use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, SqlitePool};

use crate::error::DbResult;
use harvest_core::{
    Boundary, Breadcrumb, ChemicalInventoryItem, DataTable, Equipment, Farm, Field,
    FieldOperation, Flag, Implement, ImplementAttachment, InventoryItemStatus, LocationPoint,
    MachineAlert, MachineDeviceState, MachineEngineHours, MachineMeasurement,
    MachineOperationalHours, Operator, Organization, Product, SprayApplication, SyncLogEntry,
};

/// Upper bound on rows returned by one read.
pub const MAX_PAGE_ROWS: i64 = 1000;

/// One page of a table, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct TablePage {
    pub data: Vec<Value>,
    /// Row count of the whole table.
    pub total: i64,
}

#[derive(Debug, Clone)]
pub struct TableReader {
    pool: SqlitePool,
}

impl TableReader {
    pub fn new(pool: SqlitePool) -> Self {
        TableReader { pool }
    }

    /// Reads up to `limit` rows of `table` ordered by its freshness column.
    pub async fn read(&self, table: DataTable, limit: i64) -> DbResult<TablePage> {
        let limit = limit.clamp(1, MAX_PAGE_ROWS);
        let data = match table {
            DataTable::Organizations => self.rows::<Organization>(table, limit).await?,
            DataTable::Farms => self.rows::<Farm>(table, limit).await?,
            DataTable::Fields => self.rows::<Field>(table, limit).await?,
            DataTable::Boundaries => self.rows::<Boundary>(table, limit).await?,
            DataTable::Equipment => self.rows::<Equipment>(table, limit).await?,
            DataTable::FieldOperations => self.rows::<FieldOperation>(table, limit).await?,
            DataTable::Products => self.rows::<Product>(table, limit).await?,
            DataTable::Operators => self.rows::<Operator>(table, limit).await?,
            DataTable::Flags => self.rows::<Flag>(table, limit).await?,
            DataTable::Implements => self.rows::<Implement>(table, limit).await?,
            DataTable::ImplementAttachments => {
                self.rows::<ImplementAttachment>(table, limit).await?
            }
            DataTable::LocationHistory => self.rows::<LocationPoint>(table, limit).await?,
            DataTable::Breadcrumbs => self.rows::<Breadcrumb>(table, limit).await?,
            DataTable::MachineMeasurements => self.rows::<MachineMeasurement>(table, limit).await?,
            DataTable::MachineAlerts => self.rows::<MachineAlert>(table, limit).await?,
            DataTable::MachineDeviceStates => self.rows::<MachineDeviceState>(table, limit).await?,
            DataTable::MachineEngineHours => self.rows::<MachineEngineHours>(table, limit).await?,
            DataTable::MachineOperationalHours => {
                self.rows::<MachineOperationalHours>(table, limit).await?
            }
            DataTable::ChemicalInventory => {
                let items = self.fetch::<ChemicalInventoryItem>(table, limit).await?;
                items
                    .into_iter()
                    .map(|item| serde_json::to_value(InventoryItemStatus::from(item)))
                    .collect::<Result<Vec<_>, _>>()?
            }
            DataTable::SprayApplications => self.rows::<SprayApplication>(table, limit).await?,
            DataTable::SyncLog => self.rows::<SyncLogEntry>(table, limit).await?,
        };

        let total = self.count(table).await?;
        Ok(TablePage { data, total })
    }

    pub async fn count(&self, table: DataTable) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.table_name());
        let total: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn rows<T>(&self, table: DataTable, limit: i64) -> DbResult<Vec<Value>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Serialize + Send + Unpin,
    {
        let rows = self.fetch::<T>(table, limit).await?;
        let values = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    async fn fetch<T>(&self, table: DataTable, limit: i64) -> DbResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        // Table and column names come from the closed DataTable set.
        let sql = format!(
            "SELECT * FROM {} ORDER BY {} DESC LIMIT ?1",
            table.table_name(),
            table.order_column()
        );
        let rows = sqlx::query_as::<_, T>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
