//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a waiter account
//! echo 's3cret-pass' | milo-cli account create -e mesero@milo.com -n "Mesero" -r 2
//!
//! # Revoke every session of an account (e.g. a lost phone)
//! milo-cli account revoke-sessions -e mesero@milo.com
//! ```

use std::io::BufRead;

use chrono::Utc;
use milo_api::db::{
    AccountRepository, PgAccountRepository, PgRefreshTokenRepository, RefreshTokenRepository,
    RepositoryError,
};
use milo_api::models::NewAccount;
use milo_api::services::auth::password;
use milo_core::{AccountId, Email, EmailError, RoleId};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password rejected by the strength policy.
    #[error("Weak password: {0}")]
    WeakPassword(String),

    /// Password could not be read from stdin.
    #[error("Could not read password: {0}")]
    Stdin(#[from] std::io::Error),

    /// Hashing failed.
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// Account already exists.
    #[error("Account already exists with email: {0}")]
    AccountExists(String),

    /// Role does not exist.
    #[error("Unknown role id: {0}")]
    UnknownRole(i32),

    /// No account has this email.
    #[error("No account with email: {0}")]
    UnknownAccount(String),

    #[error("Database error: {0}")]
    Repository(RepositoryError),
}

/// Fields for a new account, minus the password.
#[derive(Debug)]
pub struct CreateAccount {
    pub email: String,
    pub name: String,
    pub role_id: i32,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Read a password from the first line of stdin.
pub fn read_password() -> Result<SecretString, AccountError> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(SecretString::from(line.trim_end_matches(['\r', '\n'])))
}

/// Create a new account with an Argon2id-hashed password.
///
/// # Returns
///
/// The ID of the created account.
pub async fn create(input: CreateAccount, password: SecretString) -> Result<AccountId, AccountError> {
    let email = Email::parse(&input.email)?;
    password::validate_password_strength(password.expose_secret())
        .map_err(AccountError::WeakPassword)?;

    let password_hash = password::hash_password(password)
        .await
        .map_err(|e| AccountError::Hashing(e.to_string()))?;

    let pool = connect().await?;
    let accounts = PgAccountRepository::new(pool);

    tracing::info!("Creating account: {} (role {})", email, input.role_id);

    let account = accounts
        .create(NewAccount {
            name: input.name,
            email: email.clone(),
            password_hash,
            role_id: RoleId::new(input.role_id),
            address: input.address,
            phone: input.phone,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AccountError::AccountExists(email.to_string()),
            RepositoryError::NotFound => AccountError::UnknownRole(input.role_id),
            other => AccountError::Repository(other),
        })?;

    tracing::info!(
        "Account created successfully! ID: {}, Email: {}, Role: {}",
        account.id,
        account.email,
        account.role.name
    );

    Ok(account.id)
}

/// Revoke every live refresh token of the account with `email`.
///
/// # Returns
///
/// The number of tokens revoked.
pub async fn revoke_sessions(email: &str) -> Result<u64, AccountError> {
    let email = Email::parse(email)?;

    let pool = connect().await?;
    let accounts = PgAccountRepository::new(pool.clone());
    let refresh_tokens = PgRefreshTokenRepository::new(pool);

    let (account, _) = accounts
        .find_with_password_hash(&email)
        .await
        .map_err(AccountError::Repository)?
        .ok_or_else(|| AccountError::UnknownAccount(email.to_string()))?;

    let revoked = refresh_tokens
        .revoke_all_for_account(account.id, Utc::now())
        .await
        .map_err(AccountError::Repository)?;

    tracing::info!("Revoked {} session(s) for {}", revoked, account.email);
    Ok(revoked)
}
