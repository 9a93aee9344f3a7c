//! Persisted refresh token records.

use chrono::{DateTime, Utc};

use milo_core::{AccountId, RefreshTokenId};

/// A stored refresh token.
///
/// The raw token never reaches the database; `token_hash` is its SHA-256
/// digest. Records are only ever mutated to flip `revoked`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: RefreshTokenId,
    pub account_id: AccountId,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    /// Usable iff not revoked and `at` is strictly before expiry.
    #[must_use]
    pub fn is_usable_at(&self, at: DateTime<Utc>) -> bool {
        !self.revoked && at < self.expires_at
    }

    /// Whether the natural expiry has passed at `at`.
    #[must_use]
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.expires_at
    }
}

/// Input for inserting a refresh token.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub account_id: AccountId,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
