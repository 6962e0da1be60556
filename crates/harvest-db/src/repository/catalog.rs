//! # Catalog Repository
//!
//! Organization-scoped reference data: products (varieties, chemicals,
//! fertilizers), operators, and flags.

use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::error::DbResult;
use harvest_core::{Flag, Operator, Product, ProductType};

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn upsert_product(&self, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, org_id, name, product_type, manufacturer, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                org_id = excluded.org_id,
                name = excluded.name,
                product_type = excluded.product_type,
                manufacturer = excluded.manufacturer,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&product.id)
        .bind(&product.org_id)
        .bind(&product.name)
        .bind(product.product_type)
        .bind(&product.manufacturer)
        .bind(Json(&product.raw_data))
        .bind(product.synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Products of one catalog across all organizations.
    pub async fn list_products(&self, product_type: ProductType) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, org_id, name, product_type, manufacturer, raw_data, synced_at
            FROM products
            WHERE product_type = ?1
            ORDER BY name, id
            "#,
        )
        .bind(product_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    // =========================================================================
    // Operators
    // =========================================================================

    pub async fn upsert_operator(&self, operator: &Operator) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO operators (id, org_id, name, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                org_id = excluded.org_id,
                name = excluded.name,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&operator.id)
        .bind(&operator.org_id)
        .bind(&operator.name)
        .bind(Json(&operator.raw_data))
        .bind(operator.synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_operators(&self, org_id: &str) -> DbResult<Vec<Operator>> {
        let operators = sqlx::query_as::<_, Operator>(
            "SELECT id, org_id, name, raw_data, synced_at FROM operators WHERE org_id = ?1 ORDER BY name",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(operators)
    }

    // =========================================================================
    // Flags
    // =========================================================================

    pub async fn upsert_flag(&self, flag: &Flag) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO flags
                (id, org_id, field_id, category, notes, latitude, longitude, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                org_id = excluded.org_id,
                field_id = excluded.field_id,
                category = excluded.category,
                notes = excluded.notes,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&flag.id)
        .bind(&flag.org_id)
        .bind(&flag.field_id)
        .bind(&flag.category)
        .bind(&flag.notes)
        .bind(flag.latitude)
        .bind(flag.longitude)
        .bind(Json(&flag.raw_data))
        .bind(flag.synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_flags(&self, org_id: &str) -> DbResult<Vec<Flag>> {
        let flags = sqlx::query_as::<_, Flag>(
            r#"
            SELECT id, org_id, field_id, category, notes, latitude, longitude, raw_data, synced_at
            FROM flags
            WHERE org_id = ?1
            ORDER BY synced_at DESC
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use harvest_core::{ConnectionStatus, Organization};
    use serde_json::json;

    #[tokio::test]
    async fn test_products_by_catalog() {
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

        let repo = db.catalog();
        for (id, product_type) in [
            ("p1", ProductType::Chemical),
            ("p2", ProductType::Chemical),
            ("p3", ProductType::Variety),
        ] {
            repo.upsert_product(&Product {
                id: id.into(),
                org_id: "o1".into(),
                name: id.into(),
                product_type,
                manufacturer: String::new(),
                raw_data: json!({}),
                synced_at: Utc::now(),
            })
            .await
            .unwrap();
        }

        assert_eq!(repo.list_products(ProductType::Chemical).await.unwrap().len(), 2);
        assert_eq!(repo.list_products(ProductType::Variety).await.unwrap().len(), 1);
        assert!(repo.list_products(ProductType::Fertilizer).await.unwrap().is_empty());
    }
}
