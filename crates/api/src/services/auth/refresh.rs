//! Refresh token store.
//!
//! Refresh tokens are 64 random bytes, base64-encoded (88 characters) and
//! opaque to clients. Only the SHA-256 digest of a token is persisted; every
//! lookup hashes the presented value first.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, TimeDelta, Utc};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;

use milo_core::AccountId;

use crate::db::{RefreshTokenRepository, RepositoryError};
use crate::models::{NewRefreshToken, RefreshTokenRecord};

/// Raw token length in bytes.
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// A newly issued refresh token. The raw value is only ever handed to the
/// client.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: SecretString,
    pub expires_at: DateTime<Utc>,
}

/// Why a presented refresh token is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RefreshRejection {
    #[error("refresh token is unknown")]
    Unknown,
    #[error("refresh token was revoked")]
    Revoked,
    #[error("refresh token has expired")]
    Expired,
}

/// Errors from refresh token lookups.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Rejected(#[from] RefreshRejection),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Generate a fresh random refresh token value.
#[must_use]
pub fn generate_token() -> SecretString {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    SecretString::from(STANDARD.encode(bytes))
}

/// Hex-encoded SHA-256 digest of a token value.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Issues, validates and revokes refresh tokens.
#[derive(Clone)]
pub struct RefreshTokenStore {
    repo: Arc<dyn RefreshTokenRepository>,
    ttl: TimeDelta,
}

impl RefreshTokenStore {
    #[must_use]
    pub fn new(repo: Arc<dyn RefreshTokenRepository>, ttl: TimeDelta) -> Self {
        Self { repo, ttl }
    }

    fn new_record(&self, account_id: AccountId, now: DateTime<Utc>) -> (SecretString, NewRefreshToken) {
        let token = generate_token();
        let record = NewRefreshToken {
            account_id,
            token_hash: hash_token(token.expose_secret()),
            created_at: now,
            expires_at: now + self.ttl,
        };
        (token, record)
    }

    /// Issue and persist a new token for `account_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the insert fails.
    pub async fn issue(&self, account_id: AccountId) -> Result<IssuedRefreshToken, RepositoryError> {
        let (token, record) = self.new_record(account_id, Utc::now());
        let stored = self.repo.insert(record).await?;
        Ok(IssuedRefreshToken {
            token,
            expires_at: stored.expires_at,
        })
    }

    /// Look up a token and check it is usable right now.
    ///
    /// An expired token that was never revoked is marked revoked on the way
    /// out, so later lookups see it as such.
    ///
    /// # Errors
    ///
    /// Returns `RefreshError::Rejected` with the cause when the token is not
    /// usable, or `RefreshError::Repository` if the store fails.
    pub async fn find_usable(&self, token: &str) -> Result<RefreshTokenRecord, RefreshError> {
        let now = Utc::now();
        let hash = hash_token(token);
        let record = self
            .repo
            .find_by_hash(&hash)
            .await?
            .ok_or(RefreshRejection::Unknown)?;

        if record.revoked {
            return Err(RefreshRejection::Revoked.into());
        }
        if record.is_expired_at(now) {
            self.repo.revoke(&hash, now).await?;
            tracing::debug!(account_id = %record.account_id, "Expired refresh token marked revoked");
            return Err(RefreshRejection::Expired.into());
        }
        Ok(record)
    }

    /// Whether `token` is usable and owned by `account_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` only if the store fails; every other outcome
    /// is `Ok(false)`.
    pub async fn validate(&self, token: &str, account_id: AccountId) -> Result<bool, RepositoryError> {
        match self.find_usable(token).await {
            Ok(record) => Ok(record.account_id == account_id),
            Err(RefreshError::Rejected(_)) => Ok(false),
            Err(RefreshError::Repository(e)) => Err(e),
        }
    }

    /// Revoke `token` and issue its replacement in one atomic step.
    ///
    /// # Errors
    ///
    /// Returns `RefreshError::Rejected` if the token is not usable (including
    /// when a concurrent rotation consumed it first).
    pub async fn rotate(&self, token: &str) -> Result<(RefreshTokenRecord, IssuedRefreshToken), RefreshError> {
        let current = self.find_usable(token).await?;
        let now = Utc::now();
        let (replacement, record) = self.new_record(current.account_id, now);

        let stored = self
            .repo
            .rotate(&current.token_hash, record, now)
            .await?
            .ok_or(RefreshRejection::Revoked)?;

        Ok((
            current,
            IssuedRefreshToken {
                token: replacement,
                expires_at: stored.expires_at,
            },
        ))
    }

    /// Revoke a single token. Unknown or already revoked tokens are a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn revoke(&self, token: &str) -> Result<(), RepositoryError> {
        self.repo.revoke(&hash_token(token), Utc::now()).await?;
        Ok(())
    }

    /// Revoke every live token owned by `account_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn revoke_all(&self, account_id: AccountId) -> Result<u64, RepositoryError> {
        self.repo.revoke_all_for_account(account_id, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_shape() {
        let token = generate_token();
        let value = token.expose_secret();
        assert_eq!(value.len(), 88);
        assert_eq!(STANDARD.decode(value).map(|b| b.len()).ok(), Some(REFRESH_TOKEN_BYTES));
    }

    #[test]
    fn test_generated_tokens_differ() {
        assert_ne!(
            generate_token().expose_secret(),
            generate_token().expose_secret()
        );
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = hash_token("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_token("abc"), hash);
        assert_ne!(hash_token("abd"), hash);
    }
}
