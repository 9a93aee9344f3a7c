//! Account repository backed by `PostgreSQL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use milo_core::{AccountId, Email, RoleId};

use super::{AccountRepository, RepositoryError, map_unique_violation};
use crate::models::{Account, NewAccount, Role};

const ACCOUNT_COLUMNS: &str = r"
    a.id, a.name, a.email, a.address, a.phone, a.created_at,
    r.id AS role_id, r.name AS role_name
";

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: AccountId,
    name: String,
    email: String,
    address: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    role_id: RoleId,
    role_name: String,
}

#[derive(sqlx::FromRow)]
struct AccountWithHashRow {
    #[sqlx(flatten)]
    account: AccountRow,
    password_hash: String,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email,
            role: Role {
                id: row.role_id,
                name: row.role_name,
            },
            address: row.address,
            phone: row.phone,
            created_at: row.created_at,
        })
    }
}

/// Repository for account database operations.
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new account repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a JOIN roles r ON r.id = a.role_id WHERE a.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn find_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountWithHashRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS}, a.password_hash \
             FROM accounts a JOIN roles r ON r.id = a.role_id WHERE a.email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some((Account::try_from(r.account)?, r.password_hash))),
            None => Ok(None),
        }
    }

    async fn password_hash(&self, id: AccountId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(hash)
    }

    async fn create(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        let id = sqlx::query_scalar::<_, AccountId>(
            r"
            INSERT INTO accounts (name, email, password_hash, role_id, address, phone)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(&account.name)
        .bind(account.email.as_str())
        .bind(&account.password_hash)
        .bind(account.role_id)
        .bind(&account.address)
        .bind(&account.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            map_unique_violation(e, "email")
        })?;

        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn update_password_hash(
        &self,
        id: AccountId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE accounts SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
