//! In-memory repositories and fixtures shared by the API tests.

#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::sync::Barrier;

use milo_api::config::{ApiConfig, JwtConfig};
use milo_api::db::{
    AccountRepository, OrderRepository, RefreshTokenRepository, Repositories, RepositoryError,
};
use milo_api::models::{Account, NewAccount, NewRefreshToken, Order, RefreshTokenRecord, Role};
use milo_api::services::auth::password::hash_password;
use milo_api::state::AppState;
use milo_core::{AccountId, Email, OrderId, OrderStatus, RefreshTokenId, RoleId};

pub const JWT_SECRET: &str = "k7Qp2vXz9LmN4rTs8WyB1cFh6JdG3aEu";
pub const ADMIN_EMAIL: &str = "admin@milo.com";
pub const ADMIN_PASSWORD: &str = "123456";

// =============================================================================
// Accounts
// =============================================================================

struct StoredAccount {
    account: Account,
    password_hash: String,
}

#[derive(Default)]
pub struct InMemoryAccounts {
    accounts: Mutex<HashMap<AccountId, StoredAccount>>,
    next_id: AtomicI32,
    unreachable: AtomicBool,
}

impl InMemoryAccounts {
    /// Make `ping` fail, as if the database were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }
}

fn role(id: RoleId) -> Option<Role> {
    let name = match id.as_i32() {
        1 => "Administrador",
        2 => "Mesero",
        3 => "Cliente",
        _ => return None,
    };
    Some(Role {
        id,
        name: name.to_owned(),
    })
}

#[async_trait]
impl AccountRepository for InMemoryAccounts {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(&id)
            .map(|s| s.account.clone()))
    }

    async fn find_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .find(|s| &s.account.email == email)
            .map(|s| (s.account.clone(), s.password_hash.clone())))
    }

    async fn password_hash(&self, id: AccountId) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(&id)
            .map(|s| s.password_hash.clone()))
    }

    async fn create(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        let role = role(account.role_id).ok_or(RepositoryError::NotFound)?;
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.values().any(|s| s.account.email == account.email) {
            return Err(RepositoryError::Conflict("email already exists".into()));
        }

        let id = AccountId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let created = Account {
            id,
            name: account.name,
            email: account.email,
            role,
            address: account.address,
            phone: account.phone,
            created_at: Utc::now(),
        };
        accounts.insert(
            id,
            StoredAccount {
                account: created.clone(),
                password_hash: account.password_hash,
            },
        );
        Ok(created)
    }

    async fn update_password_hash(
        &self,
        id: AccountId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut accounts = self.accounts.lock().unwrap();
        let stored = accounts.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        password_hash.clone_into(&mut stored.password_hash);
        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

// =============================================================================
// Refresh tokens
// =============================================================================

#[derive(Default)]
pub struct InMemoryRefreshTokens {
    tokens: Mutex<Vec<RefreshTokenRecord>>,
    next_id: AtomicI32,
    /// When set, the next `rotate` fails after revoking, before inserting.
    fail_next_rotate_insert: AtomicUsize,
}

impl InMemoryRefreshTokens {
    fn record(&self, token: NewRefreshToken) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: RefreshTokenId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            account_id: token.account_id,
            token_hash: token.token_hash,
            created_at: token.created_at,
            expires_at: token.expires_at,
            revoked: false,
            revoked_at: None,
        }
    }

    pub fn all(&self) -> Vec<RefreshTokenRecord> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn live_count(&self, account_id: AccountId) -> usize {
        let now = Utc::now();
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.account_id == account_id && t.is_usable_at(now))
            .count()
    }

    /// Move a token's expiry, simulating the passage of time.
    pub fn set_expiry(&self, token_hash: &str, expires_at: DateTime<Utc>) {
        let mut tokens = self.tokens.lock().unwrap();
        if let Some(token) = tokens.iter_mut().find(|t| t.token_hash == token_hash) {
            token.expires_at = expires_at;
        }
    }

    pub fn fail_next_rotate_insert(&self) {
        self.fail_next_rotate_insert.store(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokens {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, RepositoryError> {
        let record = self.record(token);
        let mut tokens = self.tokens.lock().unwrap();
        if tokens.iter().any(|t| t.token_hash == record.token_hash) {
            return Err(RepositoryError::Conflict("refresh token already exists".into()));
        }
        tokens.push(record.clone());
        Ok(record)
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn revoke(&self, token_hash: &str, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let mut tokens = self.tokens.lock().unwrap();
        match tokens
            .iter_mut()
            .find(|t| t.token_hash == token_hash && !t.revoked)
        {
            Some(token) => {
                token.revoked = true;
                token.revoked_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_all_for_account(
        &self,
        account_id: AccountId,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut revoked = 0;
        for token in self
            .tokens
            .lock()
            .unwrap()
            .iter_mut()
            .filter(|t| t.account_id == account_id && !t.revoked)
        {
            token.revoked = true;
            token.revoked_at = Some(at);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn rotate(
        &self,
        old_hash: &str,
        replacement: NewRefreshToken,
        at: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError> {
        let record = self.record(replacement);
        // One lock for the whole step stands in for the database transaction.
        let mut tokens = self.tokens.lock().unwrap();
        let Some(index) = tokens
            .iter()
            .position(|t| t.token_hash == old_hash && t.is_usable_at(at))
        else {
            return Ok(None);
        };

        if self.fail_next_rotate_insert.swap(0, Ordering::SeqCst) == 1 {
            // Nothing was written yet, which is what a rollback leaves behind.
            return Err(RepositoryError::DataCorruption("simulated insert failure".into()));
        }

        let old = &mut tokens[index];
        old.revoked = true;
        old.revoked_at = Some(at);
        tokens.push(record.clone());
        Ok(Some(record))
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Default)]
pub struct InMemoryOrders {
    orders: Mutex<HashMap<OrderId, Order>>,
    read_gate: Mutex<Option<(Arc<Barrier>, usize)>>,
}

impl InMemoryOrders {
    /// Hold the next `readers` reads until all of them have arrived, so that
    /// concurrent callers all observe the same starting status.
    pub fn gate_reads(&self, readers: usize) {
        *self.read_gate.lock().unwrap() = Some((Arc::new(Barrier::new(readers)), readers));
    }

    fn take_gate(&self) -> Option<Arc<Barrier>> {
        let mut gate = self.read_gate.lock().unwrap();
        let (barrier, remaining) = gate.as_mut()?;
        let barrier = barrier.clone();
        *remaining -= 1;
        if *remaining == 0 {
            *gate = None;
        }
        Some(barrier)
    }

    pub fn insert(&self, id: i32, status: OrderStatus, notes: Option<&str>) -> OrderId {
        let id = OrderId::new(id);
        self.orders.lock().unwrap().insert(
            id,
            Order {
                id,
                account_id: None,
                created_at: Utc::now(),
                total: Decimal::new(4250, 2),
                status,
                notes: notes.map(str::to_owned),
            },
        );
        id
    }

    pub fn get(&self, id: OrderId) -> Option<Order> {
        self.orders.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let gate = self.take_gate();
        if let Some(barrier) = gate {
            barrier.wait().await;
        }
        Ok(self.get(id))
    }

    async fn update_status_if(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        notes: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(&id) {
            Some(order) if order.status == expected => {
                order.status = next;
                if let Some(notes) = notes {
                    order.notes = Some(notes.to_owned());
                }
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn test_config() -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("postgres://unused/milo"),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        jwt: JwtConfig {
            secret: SecretString::from(JWT_SECRET),
            issuer: "milo-api".to_owned(),
            audience: "milo-clients".to_owned(),
            lifespan: TimeDelta::minutes(60),
        },
        refresh_token_ttl: TimeDelta::days(30),
        auth_rate_limit: false,
        trust_proxy_headers: false,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Application state over in-memory repositories, with handles kept for
/// seeding and inspection.
pub struct TestApp {
    pub state: AppState,
    pub accounts: Arc<InMemoryAccounts>,
    pub refresh_tokens: Arc<InMemoryRefreshTokens>,
    pub orders: Arc<InMemoryOrders>,
}

impl TestApp {
    pub fn new() -> Self {
        let accounts = Arc::new(InMemoryAccounts::default());
        let refresh_tokens = Arc::new(InMemoryRefreshTokens::default());
        let orders = Arc::new(InMemoryOrders::default());

        let repositories = Repositories {
            accounts: accounts.clone(),
            refresh_tokens: refresh_tokens.clone(),
            orders: orders.clone(),
        };

        Self {
            state: AppState::with_repositories(test_config(), repositories),
            accounts,
            refresh_tokens,
            orders,
        }
    }

    /// Seed an account with a real Argon2id hash of `password`.
    pub async fn seed_account(&self, email: &str, password: &str, role_id: i32) -> Account {
        let password_hash = hash_password(SecretString::from(password)).await.unwrap();
        self.accounts
            .create(NewAccount {
                name: "Test Account".to_owned(),
                email: Email::parse(email).unwrap(),
                password_hash,
                role_id: RoleId::new(role_id),
                address: None,
                phone: None,
            })
            .await
            .unwrap()
    }

    pub async fn seed_admin(&self) -> Account {
        self.seed_account(ADMIN_EMAIL, ADMIN_PASSWORD, 1).await
    }
}
