//! # Implement Repository
//!
//! Implements have no guaranteed vendor id, so they are keyed by
//! `(org_id, natural_key)` and get a local UUID on first sight.
//!
//! ## Attachment Lifecycle
//! ```text
//!  vendor says mounted on    open attachment     action
//!  ───────────────────────   ─────────────────   ─────────────────────────
//!  M                         none                open (I, M)
//!  M                         (I, M)              nothing
//!  N                         (I, M)              close (I, M), open (I, N)
//!  nothing                   (I, M)              close (I, M)
//! ```

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use harvest_core::vendor::ImplementRecord;
use harvest_core::{Implement, ImplementAttachment};

#[derive(Debug, Clone)]
pub struct ImplementRepository {
    pool: SqlitePool,
}

impl ImplementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ImplementRepository { pool }
    }

    /// Upserts an implement on its natural key.
    ///
    /// ## Returns
    /// The local id, stable across re-syncs.
    pub async fn upsert(
        &self,
        org_id: &str,
        record: &ImplementRecord,
        synced_at: DateTime<Utc>,
    ) -> DbResult<String> {
        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO implements
                (id, external_id, org_id, natural_key, name, implement_type, make, model,
                 serial_number, raw_data, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(org_id, natural_key) DO UPDATE SET
                external_id = excluded.external_id,
                name = excluded.name,
                implement_type = excluded.implement_type,
                make = excluded.make,
                model = excluded.model,
                serial_number = excluded.serial_number,
                raw_data = excluded.raw_data,
                synced_at = excluded.synced_at
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&record.external_id)
        .bind(org_id)
        .bind(&record.natural_key)
        .bind(&record.name)
        .bind(&record.implement_type)
        .bind(&record.make)
        .bind(&record.model)
        .bind(&record.serial_number)
        .bind(Json(&record.raw))
        .bind(synced_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Reconciles the open attachment of an implement with what the vendor
    /// currently reports.
    ///
    /// ## Arguments
    /// * `implement_id` - Local implement id
    /// * `equipment_id` - Machine it is mounted on, or `None` when detached.
    ///   Machines that are not mirrored are treated as `None`.
    /// * `now` - Attach / detach timestamp
    pub async fn sync_attachment(
        &self,
        implement_id: &str,
        equipment_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let open: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT id, equipment_id FROM implement_attachments
            WHERE implement_id = ?1 AND detached_at IS NULL
            "#,
        )
        .bind(implement_id)
        .fetch_optional(&mut *tx)
        .await?;

        let target: Option<String> = match equipment_id {
            Some(eq) => {
                sqlx::query_scalar("SELECT id FROM equipment WHERE id = ?1")
                    .bind(eq)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };

        let unchanged = matches!((&open, &target), (Some((_, current)), Some(wanted)) if current == wanted);
        if !unchanged {
            if let Some((attachment_id, previous)) = &open {
                debug!(implement_id = %implement_id, equipment_id = %previous, "Detaching implement");
                sqlx::query("UPDATE implement_attachments SET detached_at = ?2 WHERE id = ?1")
                    .bind(attachment_id)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
            }
            if let Some(eq) = &target {
                debug!(implement_id = %implement_id, equipment_id = %eq, "Attaching implement");
                sqlx::query(
                    r#"
                    INSERT INTO implement_attachments (id, implement_id, equipment_id, attached_at)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(implement_id)
                .bind(eq)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    pub async fn list(&self, org_id: &str) -> DbResult<Vec<Implement>> {
        let implements = sqlx::query_as::<_, Implement>(
            r#"
            SELECT id, external_id, org_id, natural_key, name, implement_type, make, model,
                   serial_number, raw_data, synced_at
            FROM implements
            WHERE org_id = ?1
            ORDER BY name, natural_key
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(implements)
    }

    /// Attachment history of one implement, newest first.
    pub async fn attachments(&self, implement_id: &str) -> DbResult<Vec<ImplementAttachment>> {
        let attachments = sqlx::query_as::<_, ImplementAttachment>(
            r#"
            SELECT id, implement_id, equipment_id, attached_at, detached_at
            FROM implement_attachments
            WHERE implement_id = ?1
            ORDER BY attached_at DESC
            "#,
        )
        .bind(implement_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attachments)
    }
}
