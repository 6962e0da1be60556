//! # Field Operation Repository

use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::error::DbResult;
use harvest_core::FieldOperation;

const SELECT_OPERATION: &str = r#"
    SELECT id, field_id, org_id, operation_type, start_date, end_date, area,
           products, measurements, raw_data, synced_at
    FROM field_operations
"#;

#[derive(Debug, Clone)]
pub struct OperationRepository {
    pool: SqlitePool,
}

impl OperationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OperationRepository { pool }
    }

    pub async fn upsert(&self, op: &FieldOperation) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO field_operations
                (id, field_id, org_id, operation_type, start_date, end_date, area,
                 products, measurements, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                field_id = excluded.field_id,
                org_id = excluded.org_id,
                operation_type = excluded.operation_type,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                area = excluded.area,
                products = excluded.products,
                measurements = excluded.measurements,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&op.id)
        .bind(&op.field_id)
        .bind(&op.org_id)
        .bind(&op.operation_type)
        .bind(op.start_date)
        .bind(op.end_date)
        .bind(op.area)
        .bind(Json(&op.products))
        .bind(Json(&op.measurements))
        .bind(Json(&op.raw_data))
        .bind(op.synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Operations of one field, newest first.
    pub async fn list_for_field(&self, field_id: &str) -> DbResult<Vec<FieldOperation>> {
        let sql = format!(
            "{} WHERE field_id = ?1 ORDER BY start_date DESC, id",
            SELECT_OPERATION
        );
        let ops = sqlx::query_as::<_, FieldOperation>(&sql)
            .bind(field_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ops)
    }
}
