//! Persistence adapters for the Milo `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `roles` - Seeded account roles (`Administrador`, `Mesero`, `Cliente`)
//! - `accounts` - Registered accounts with their Argon2id password hash
//! - `refresh_tokens` - SHA-256 digests of issued refresh tokens
//! - `orders` - Restaurant orders; `status` is `SMALLINT` 1..=5
//!
//! Services depend on the repository traits below rather than on the
//! `Pg*` implementations, so tests can swap in in-memory stores.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p milo-cli -- migrate
//! ```

pub mod accounts;
pub mod orders;
pub mod refresh_tokens;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use milo_core::{AccountId, Email, OrderId, OrderStatus};

pub use accounts::PgAccountRepository;
pub use orders::PgOrderRepository;
pub use refresh_tokens::PgRefreshTokenRepository;

use crate::models::{Account, NewAccount, NewRefreshToken, Order, RefreshTokenRecord};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Account lookups and credential storage.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find an account by ID.
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, RepositoryError>;

    /// Find an account by email together with its stored password hash.
    async fn find_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(Account, String)>, RepositoryError>;

    /// Stored password hash for an account.
    async fn password_hash(&self, id: AccountId) -> Result<Option<String>, RepositoryError>;

    /// Insert a new account.
    ///
    /// Returns `RepositoryError::Conflict` when the email is taken and
    /// `RepositoryError::NotFound` when the role does not exist.
    async fn create(&self, account: NewAccount) -> Result<Account, RepositoryError>;

    /// Replace the stored password hash.
    ///
    /// Returns `RepositoryError::NotFound` when the account does not exist.
    async fn update_password_hash(
        &self,
        id: AccountId,
        password_hash: &str,
    ) -> Result<(), RepositoryError>;

    /// Cheap round trip used by the readiness check.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Persisted refresh tokens, addressed by the SHA-256 digest of their value.
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Insert a new token record.
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, RepositoryError>;

    /// Find a token record by digest, whatever its state.
    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError>;

    /// Mark a token revoked.
    ///
    /// Returns `true` only if this call flipped the flag; already revoked or
    /// unknown digests return `false`.
    async fn revoke(&self, token_hash: &str, at: DateTime<Utc>) -> Result<bool, RepositoryError>;

    /// Revoke every live token owned by an account, returning how many flipped.
    async fn revoke_all_for_account(
        &self,
        account_id: AccountId,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;

    /// Atomically revoke `old_hash` and insert `replacement`.
    ///
    /// The revoke only applies to a token that is still usable at `at`. When
    /// it matches nothing, nothing is inserted and `None` is returned.
    async fn rotate(
        &self,
        old_hash: &str,
        replacement: NewRefreshToken,
        at: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError>;
}

/// Order reads and the guarded status write.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Find an order by ID.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Set `status = next` only if the stored status is still `expected`.
    ///
    /// Notes are overwritten only when `notes` is `Some`. Returns `None`
    /// when no row matched, either because the order is gone or because a
    /// concurrent writer changed its status first.
    async fn update_status_if(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        notes: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError>;
}

/// The repository set handed to services.
#[derive(Clone)]
pub struct Repositories {
    pub accounts: Arc<dyn AccountRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub orders: Arc<dyn OrderRepository>,
}

impl Repositories {
    /// `PostgreSQL`-backed repositories sharing one pool.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            accounts: Arc::new(PgAccountRepository::new(pool.clone())),
            refresh_tokens: Arc::new(PgRefreshTokenRepository::new(pool.clone())),
            orders: Arc::new(PgOrderRepository::new(pool)),
        }
    }
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
pub(crate) fn map_unique_violation(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(err)
}
