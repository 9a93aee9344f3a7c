//! Refresh token repository backed by `PostgreSQL`.
//!
//! Rows are never deleted; revocation flips `is_revoked` and stamps
//! `revoked_at` so the table doubles as an audit trail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use milo_core::{AccountId, RefreshTokenId};

use super::{RefreshTokenRepository, RepositoryError, map_unique_violation};
use crate::models::{NewRefreshToken, RefreshTokenRecord};

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: RefreshTokenId,
    account_id: AccountId,
    token_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_revoked: bool,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            token_hash: row.token_hash,
            created_at: row.created_at,
            expires_at: row.expires_at,
            revoked: row.is_revoked,
            revoked_at: row.revoked_at,
        }
    }
}

const INSERT_TOKEN: &str = r"
    INSERT INTO refresh_tokens (token_hash, account_id, created_at, expires_at)
    VALUES ($1, $2, $3, $4)
    RETURNING id, account_id, token_hash, created_at, expires_at, is_revoked, revoked_at
";

/// Repository for refresh token database operations.
#[derive(Clone)]
pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    /// Create a new refresh token repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, RepositoryError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(INSERT_TOKEN)
            .bind(&token.token_hash)
            .bind(token.account_id)
            .bind(token.created_at)
            .bind(token.expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "refresh token"))?;

        Ok(row.into())
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r"
            SELECT id, account_id, token_hash, created_at, expires_at, is_revoked, revoked_at
            FROM refresh_tokens
            WHERE token_hash = $1
            ",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn revoke(&self, token_hash: &str, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE refresh_tokens
            SET is_revoked = TRUE, revoked_at = $2
            WHERE token_hash = $1 AND is_revoked = FALSE
            ",
        )
        .bind(token_hash)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_account(
        &self,
        account_id: AccountId,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE refresh_tokens
            SET is_revoked = TRUE, revoked_at = $2
            WHERE account_id = $1 AND is_revoked = FALSE
            ",
        )
        .bind(account_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn rotate(
        &self,
        old_hash: &str,
        replacement: NewRefreshToken,
        at: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError> {
        // Dropping `tx` without commit rolls back, so a cancelled request
        // leaves the old token untouched.
        let mut tx = self.pool.begin().await?;

        let revoked = sqlx::query(
            r"
            UPDATE refresh_tokens
            SET is_revoked = TRUE, revoked_at = $2
            WHERE token_hash = $1 AND is_revoked = FALSE AND expires_at > $2
            ",
        )
        .bind(old_hash)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        if revoked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query_as::<_, RefreshTokenRow>(INSERT_TOKEN)
            .bind(&replacement.token_hash)
            .bind(replacement.account_id)
            .bind(replacement.created_at)
            .bind(replacement.expires_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_unique_violation(e, "refresh token"))?;

        tx.commit().await?;

        Ok(Some(row.into()))
    }
}
