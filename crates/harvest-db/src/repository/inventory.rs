//! # Inventory Repository
//!
//! Locally maintained chemical stock and the spray ledger that consumes it.
//!
//! ```text
//!  vendor field operation ──derive──▶ spray_applications (source = vendor, deduplicated)
//!
//!  manual log ──┬──────────────────▶ spray_applications (source = manual)
//!               └──── same tx ─────▶ chemical_inventory.quantity -= amount (floored at 0)
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use harvest_core::{
    ChemicalInventoryItem, InventoryItemStatus, InventoryUpdate, ManualSprayLog,
    NewSprayApplication, SprayApplication,
};

const SELECT_ITEM: &str = r#"
    SELECT id, product_id, product_name, quantity, unit, low_stock_threshold, updated_at
    FROM chemical_inventory
"#;

#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    // =========================================================================
    // Inventory Items
    // =========================================================================

    /// Adds an item or updates the matching one.
    ///
    /// The match is by `id` when given, otherwise by product id, otherwise by
    /// product name. Negative quantities are stored as zero.
    pub async fn upsert_item(&self, update: &InventoryUpdate) -> DbResult<ChemicalInventoryItem> {
        if update.product_name.trim().is_empty() {
            return Err(DbError::InvalidInput(
                "inventory item requires a product name".into(),
            ));
        }

        let existing = match &update.id {
            Some(id) => Some(id.clone()),
            None => self.find_item_id(update.product_id.as_deref(), &update.product_name).await?,
        };

        let item = ChemicalInventoryItem {
            id: existing.unwrap_or_else(|| Uuid::new_v4().to_string()),
            product_id: update.product_id.clone(),
            product_name: update.product_name.clone(),
            quantity: update.quantity.max(0.0),
            unit: update.unit.clone(),
            low_stock_threshold: update.low_stock_threshold.max(0.0),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO chemical_inventory
                (id, product_id, product_name, quantity, unit, low_stock_threshold, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                product_id = COALESCE(excluded.product_id, chemical_inventory.product_id),
                product_name = excluded.product_name,
                quantity = excluded.quantity,
                unit = excluded.unit,
                low_stock_threshold = excluded.low_stock_threshold,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&item.id)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.low_stock_threshold)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        self.get_item(&item.id)
            .await?
            .ok_or_else(|| DbError::not_found("ChemicalInventoryItem", &item.id))
    }

    pub async fn get_item(&self, id: &str) -> DbResult<Option<ChemicalInventoryItem>> {
        let sql = format!("{} WHERE id = ?1", SELECT_ITEM);
        let item = sqlx::query_as::<_, ChemicalInventoryItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Inventory with the computed low-stock flag, most recently updated first.
    pub async fn list_items(&self) -> DbResult<Vec<InventoryItemStatus>> {
        let sql = format!("{} ORDER BY updated_at DESC", SELECT_ITEM);
        let items = sqlx::query_as::<_, ChemicalInventoryItem>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(items.into_iter().map(InventoryItemStatus::from).collect())
    }

    async fn find_item_id(&self, product_id: Option<&str>, product_name: &str) -> DbResult<Option<String>> {
        if let Some(product_id) = product_id {
            let by_product: Option<String> =
                sqlx::query_scalar("SELECT id FROM chemical_inventory WHERE product_id = ?1 LIMIT 1")
                    .bind(product_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if by_product.is_some() {
                return Ok(by_product);
            }
        }
        let by_name: Option<String> =
            sqlx::query_scalar("SELECT id FROM chemical_inventory WHERE product_name = ?1 LIMIT 1")
                .bind(product_name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(by_name)
    }

    // =========================================================================
    // Spray Ledger
    // =========================================================================

    /// Inserts a vendor-derived application unless the same
    /// (field, product, date) is already recorded.
    ///
    /// ## Returns
    /// * `true` - a new row was written
    pub async fn insert_vendor_spray(&self, application: &NewSprayApplication) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO spray_applications
                (id, field_id, product_name, equipment_id, equipment_name, operation_id,
                 amount, unit, application_date, source, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&application.field_id)
        .bind(&application.product_name)
        .bind(&application.equipment_id)
        .bind(&application.equipment_name)
        .bind(&application.operation_id)
        .bind(application.amount)
        .bind(&application.unit)
        .bind(application.application_date)
        .bind(application.source)
        .bind(&application.notes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            debug!(
                field_id = %application.field_id,
                product = %application.product_name,
                date = %application.application_date,
                "Recorded vendor spray application"
            );
        }
        Ok(inserted)
    }

    /// Records a manual application and draws down the matching inventory
    /// item in one transaction.
    pub async fn log_manual_application(&self, log: &ManualSprayLog) -> DbResult<SprayApplication> {
        if log.field_id.trim().is_empty() || log.product_name.trim().is_empty() {
            return Err(DbError::InvalidInput(
                "spray application requires a field and a product".into(),
            ));
        }
        if !log.amount.is_finite() || log.amount < 0.0 {
            return Err(DbError::InvalidInput(format!(
                "spray amount must be a non-negative number, got {}",
                log.amount
            )));
        }

        let application = log.to_application();
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO spray_applications
                (id, field_id, product_name, equipment_id, equipment_name, operation_id,
                 amount, unit, application_date, source, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&id)
        .bind(&application.field_id)
        .bind(&application.product_name)
        .bind(&application.equipment_id)
        .bind(&application.equipment_name)
        .bind(&application.operation_id)
        .bind(application.amount)
        .bind(&application.unit)
        .bind(application.application_date)
        .bind(application.source)
        .bind(&application.notes)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        let drawn = draw_down(&mut tx, log, created_at).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            field_id = %log.field_id,
            product = %log.product_name,
            amount = log.amount,
            inventory_updated = drawn,
            "Logged manual spray application"
        );

        Ok(SprayApplication {
            id,
            field_id: application.field_id,
            product_name: application.product_name,
            equipment_id: application.equipment_id,
            equipment_name: application.equipment_name,
            operation_id: application.operation_id,
            amount: application.amount,
            unit: application.unit,
            application_date: application.application_date,
            source: application.source,
            notes: application.notes,
            created_at,
        })
    }

    /// Applications for one field, newest first.
    pub async fn list_applications(&self, field_id: &str) -> DbResult<Vec<SprayApplication>> {
        let applications = sqlx::query_as::<_, SprayApplication>(
            r#"
            SELECT id, field_id, product_name, equipment_id, equipment_name, operation_id,
                   amount, unit, application_date, source, notes, created_at
            FROM spray_applications
            WHERE field_id = ?1
            ORDER BY application_date DESC, created_at DESC
            "#,
        )
        .bind(field_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }
}

/// Decrements the item matching the logged product, by product id first and
/// product name second.
///
/// ## Returns
/// * `true` - an inventory item was updated
async fn draw_down(
    tx: &mut Transaction<'_, Sqlite>,
    log: &ManualSprayLog,
    at: DateTime<Utc>,
) -> DbResult<bool> {
    if let Some(product_id) = &log.product_id {
        let result = sqlx::query(
            r#"
            UPDATE chemical_inventory
            SET quantity = MAX(0, quantity - ?2), updated_at = ?3
            WHERE id = (SELECT id FROM chemical_inventory WHERE product_id = ?1 LIMIT 1)
            "#,
        )
        .bind(product_id)
        .bind(log.amount)
        .bind(at)
        .execute(&mut **tx)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
    }

    let result = sqlx::query(
        r#"
        UPDATE chemical_inventory
        SET quantity = MAX(0, quantity - ?2), updated_at = ?3
        WHERE id = (SELECT id FROM chemical_inventory WHERE product_name = ?1 LIMIT 1)
        "#,
    )
    .bind(&log.product_name)
    .bind(log.amount)
    .bind(at)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::NaiveDate;
    use harvest_core::SpraySource;

    fn update(name: &str, quantity: f64, threshold: f64) -> InventoryUpdate {
        InventoryUpdate {
            id: None,
            product_id: None,
            product_name: name.into(),
            quantity,
            unit: "gal".into(),
            low_stock_threshold: threshold,
        }
    }

    fn manual(amount: f64) -> ManualSprayLog {
        ManualSprayLog {
            field_id: "f1".into(),
            product_name: "Roundup".into(),
            product_id: None,
            amount,
            unit: Some("gal".into()),
            application_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            equipment_id: None,
            equipment_name: None,
            notes: None,
        }
    }

    fn vendor_row() -> NewSprayApplication {
        NewSprayApplication {
            field_id: "f1".into(),
            product_name: "Roundup".into(),
            equipment_id: None,
            equipment_name: None,
            operation_id: Some("op-1".into()),
            amount: Some(2.0),
            unit: None,
            application_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            source: SpraySource::Vendor,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_matches_by_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.inventory();

        let first = repo.upsert_item(&update("Roundup", 50.0, 10.0)).await.unwrap();
        let second = repo.upsert_item(&update("Roundup", 8.0, 10.0)).await.unwrap();
        assert_eq!(first.id, second.id);

        let items = repo.list_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item.quantity, 8.0);
        assert!(items[0].is_low_stock);
    }

    #[tokio::test]
    async fn test_vendor_spray_is_deduplicated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.inventory();

        assert!(repo.insert_vendor_spray(&vendor_row()).await.unwrap());
        assert!(!repo.insert_vendor_spray(&vendor_row()).await.unwrap());
        assert_eq!(repo.list_applications("f1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_manual_log_draws_down_and_floors_at_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.inventory();
        let item = repo.upsert_item(&update("Roundup", 5.0, 0.0)).await.unwrap();

        repo.log_manual_application(&manual(2.0)).await.unwrap();
        assert_eq!(repo.get_item(&item.id).await.unwrap().unwrap().quantity, 3.0);

        repo.log_manual_application(&manual(10.0)).await.unwrap();
        assert_eq!(repo.get_item(&item.id).await.unwrap().unwrap().quantity, 0.0);

        // Manual entries are not deduplicated.
        let ledger = repo.list_applications("f1").await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.iter().all(|a| a.source == SpraySource::Manual));
    }

    #[tokio::test]
    async fn test_manual_log_rejects_negative_and_non_finite_amounts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.inventory();
        let item = repo.upsert_item(&update("Roundup", 5.0, 0.0)).await.unwrap();

        for amount in [-100.0, f64::NAN, f64::INFINITY] {
            let result = repo.log_manual_application(&manual(amount)).await;
            assert!(matches!(result, Err(DbError::InvalidInput(_))));
        }

        // Stock and ledger are untouched.
        assert_eq!(repo.get_item(&item.id).await.unwrap().unwrap().quantity, 5.0);
        assert!(repo.list_applications("f1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manual_log_without_stock_still_records() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.inventory();

        let applied = repo.log_manual_application(&manual(1.0)).await.unwrap();
        assert_eq!(applied.amount, Some(1.0));
        assert!(repo.list_items().await.unwrap().is_empty());
    }
}
