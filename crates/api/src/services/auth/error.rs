//! Authentication error types.
//!
//! Services work with the detailed [`AuthFailure`]; callers only ever see
//! [`AuthError`]. The conversion between the two is the single place where
//! credential and token sub-causes are logged and then collapsed.

use thiserror::Error;

use milo_core::{AccountId, EmailError, RoleId};

use super::refresh::RefreshRejection;
use super::token::{SigningError, TokenRejection};
use crate::db::RepositoryError;

/// Errors returned by the session service.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Login failed. Identical for unknown accounts and wrong passwords.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Access or refresh token failed validation, whatever the cause.
    #[error("invalid token")]
    InvalidToken,

    /// Invalid email format on registration.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password too weak.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// An account with this email already exists.
    #[error("account already exists")]
    AccountAlreadyExists,

    /// The caller's role does not allow the operation.
    #[error("forbidden")]
    Forbidden,

    /// Registration named a role that does not exist.
    #[error("unknown role: {0}")]
    UnknownRole(RoleId),

    /// Anything else; detail is for server logs only.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Detailed failure causes, never shown to clients.
#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("login email is malformed")]
    MalformedEmail,

    #[error("no account for {0}")]
    UnknownEmail(String),

    #[error("wrong password for account {0}")]
    WrongPassword(AccountId),

    #[error("access token rejected: {0}")]
    Token(#[from] TokenRejection),

    #[error(transparent)]
    Refresh(#[from] RefreshRejection),

    #[error("token subject {0} no longer exists")]
    AccountGone(AccountId),

    /// Input validation failure that is safe to show as is.
    #[error("rejected: {0}")]
    Rejected(AuthError),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<AuthFailure> for AuthError {
    fn from(failure: AuthFailure) -> Self {
        collapse(failure)
    }
}

/// Map a detailed failure onto the client-visible taxonomy.
fn collapse(failure: AuthFailure) -> AuthError {
    match failure {
        AuthFailure::MalformedEmail => {
            tracing::warn!("Login rejected: malformed email");
            AuthError::InvalidCredentials
        }
        AuthFailure::UnknownEmail(email) => {
            tracing::warn!(%email, "Login rejected: unknown email");
            AuthError::InvalidCredentials
        }
        AuthFailure::WrongPassword(account_id) => {
            tracing::warn!(%account_id, "Credential check failed: wrong password");
            AuthError::InvalidCredentials
        }
        AuthFailure::Token(cause) => {
            tracing::warn!(%cause, "Access token rejected");
            AuthError::InvalidToken
        }
        AuthFailure::Refresh(cause) => {
            tracing::warn!(%cause, "Refresh token rejected");
            AuthError::InvalidToken
        }
        AuthFailure::AccountGone(account_id) => {
            tracing::warn!(%account_id, "Token subject no longer exists");
            AuthError::InvalidToken
        }
        AuthFailure::Rejected(err) => err,
        AuthFailure::Repository(RepositoryError::Conflict(_)) => AuthError::AccountAlreadyExists,
        other @ (AuthFailure::Hashing(_) | AuthFailure::Signing(_) | AuthFailure::Repository(_)) => {
            AuthError::Unexpected(other.to_string())
        }
    }
}
