//! # Credential Repository
//!
//! Storage for the single active OAuth2 credential.
//!
//! ```text
//!  authorization-code exchange ──► replace_all()   DELETE all + INSERT one
//!                                                  (one transaction)
//!  token refresh ────────────────► update_tokens() in-place overwrite
//!  every sync call ──────────────► latest()        newest by created_at
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use harvest_core::Credential;

const SELECT_CREDENTIAL: &str = r#"
    SELECT id, access_token, refresh_token, expires_at, scopes, created_at, updated_at
    FROM credentials
"#;

#[derive(Debug, Clone)]
pub struct CredentialRepository {
    pool: SqlitePool,
}

impl CredentialRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CredentialRepository { pool }
    }

    /// The most recently created credential, if any.
    pub async fn latest(&self) -> DbResult<Option<Credential>> {
        let sql = format!("{} ORDER BY created_at DESC LIMIT 1", SELECT_CREDENTIAL);
        let credential = sqlx::query_as::<_, Credential>(&sql)
            .fetch_optional(&self.pool)
            .await?;
        Ok(credential)
    }

    /// Replaces every stored credential with a new one, atomically.
    ///
    /// ## Arguments
    /// * `access_token` / `refresh_token` - Tokens from the code exchange
    /// * `expires_at` - Absolute expiry of the access token
    /// * `scopes` - Space separated granted scopes
    pub async fn replace_all(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
        scopes: &str,
    ) -> DbResult<Credential> {
        let now = Utc::now();
        let credential = Credential {
            id: Uuid::new_v4().to_string(),
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at,
            scopes: scopes.to_string(),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let removed = sqlx::query("DELETE FROM credentials")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query(
            r#"
            INSERT INTO credentials
                (id, access_token, refresh_token, expires_at, scopes, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&credential.id)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at)
        .bind(&credential.scopes)
        .bind(credential.created_at)
        .bind(credential.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            removed = removed,
            expires_at = %credential.expires_at,
            "Stored new credential"
        );
        Ok(credential)
    }

    /// Overwrites the tokens of an existing credential after a refresh.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - the credential was replaced meanwhile
    pub async fn update_tokens(
        &self,
        id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(credential_id = %id, "Updating refreshed tokens");

        let result = sqlx::query(
            r#"
            UPDATE credentials
            SET access_token = ?2, refresh_token = ?3, expires_at = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Credential", id));
        }
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credentials")
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
    async fn test_replace_all_keeps_single_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.credentials();
        assert!(repo.latest().await.unwrap().is_none());

        let expiry = Utc::now() + Duration::hours(1);
        repo.replace_all("a1", "r1", expiry, "ag1").await.unwrap();
        let second = repo.replace_all("a2", "r2", expiry, "ag1 ag2").await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        let latest = repo.latest().await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.access_token, "a2");
        assert_eq!(latest.scopes, "ag1 ag2");
    }

    #[tokio::test]
    async fn test_update_tokens() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.credentials();
        let stored = repo
            .replace_all("a1", "r1", Utc::now(), "")
            .await
            .unwrap();

        let new_expiry = Utc::now() + Duration::hours(2);
        repo.update_tokens(&stored.id, "a2", "r1", new_expiry)
            .await
            .unwrap();

        let latest = repo.latest().await.unwrap().unwrap();
        assert_eq!(latest.access_token, "a2");
        assert_eq!(latest.refresh_token, "r1");
        assert_eq!(latest.expires_at.timestamp(), new_expiry.timestamp());

        let missing = repo.update_tokens("nope", "x", "y", new_expiry).await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));
    }
}
