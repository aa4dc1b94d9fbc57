//! Refresh token storage.
//!
//! Tokens are soft-revoked and never deleted. Access tokens are stateless and
//! never touch this table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use super::from_unix;
use crate::store::{RefreshTokenRecord, RefreshTokenRepository, StoreError};

/// Store for managing refresh tokens.
#[derive(Clone)]
pub struct TokenStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    token: String,
    email: String,
    created_at: i64,
    expires_at: i64,
    revoked: i32,
}

impl From<TokenRow> for RefreshTokenRecord {
    fn from(row: TokenRow) -> Self {
        Self {
            token: row.token,
            email: row.email,
            created_at: from_unix(row.created_at),
            expires_at: from_unix(row.expires_at),
            revoked: row.revoked != 0,
        }
    }
}

const INSERT_TOKEN: &str = "INSERT INTO refresh_tokens (token, email, created_at, expires_at, revoked) VALUES (?, ?, ?, ?, ?)";

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for TokenStore {
    async fn create_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        sqlx::query(INSERT_TOKEN)
            .bind(&record.token)
            .bind(&record.email)
            .bind(record.created_at.timestamp())
            .bind(record.expires_at.timestamp())
            .bind(record.revoked as i32)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let row: Option<TokenRow> = sqlx::query_as(
            "SELECT token, email, created_at, expires_at, revoked FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RefreshTokenRecord::from))
    }

    async fn rotate_refresh_token(
        &self,
        presented: &str,
        replacement: &RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Compare-and-set: only an unrevoked, unexpired row can be claimed.
        // The write lock taken here serializes concurrent rotations.
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = 1 WHERE token = ? AND revoked = 0 AND expires_at > ?",
        )
        .bind(presented)
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(INSERT_TOKEN)
            .bind(&replacement.token)
            .bind(&replacement.email)
            .bind(replacement.created_at.timestamp())
            .bind(replacement.expires_at.timestamp())
            .bind(replacement.revoked as i32)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
