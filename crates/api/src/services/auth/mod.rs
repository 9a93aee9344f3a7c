//! Session and authentication service.
//!
//! Composes the credential verifier, the token signer and the refresh token
//! store into login, refresh, logout and the account operations built on
//! them. Every public method returns [`AuthError`]; detailed causes are
//! collapsed in one place (see [`error`]).

mod error;
pub mod password;
pub mod refresh;
pub mod token;

pub use error::AuthError;
pub use refresh::{IssuedRefreshToken, RefreshTokenStore};
pub use token::{IssuedAccessToken, TokenSigner, TokenValidator};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use milo_core::{AccountId, Email, RoleId};

use crate::db::{AccountRepository, RepositoryError};
use crate::models::{AccountSummary, Identity, NewAccount, roles};
use error::AuthFailure;
use refresh::RefreshError;

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub access_token: String,
    pub refresh_token: SecretString,
    /// Access token expiry.
    pub expires_at: DateTime<Utc>,
    pub account: AccountSummary,
}

/// Result of a successful refresh. The presented token is revoked and
/// `refresh_token` replaces it.
#[derive(Debug, Clone)]
pub struct RefreshedSession {
    pub access_token: String,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

/// Input for account registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    pub role_id: RoleId,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl From<RefreshError> for AuthFailure {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Rejected(cause) => Self::Refresh(cause),
            RefreshError::Repository(e) => Self::Repository(e),
        }
    }
}

/// Validate a bearer token and rebuild the caller's identity.
///
/// # Errors
///
/// Returns `AuthError::InvalidToken` for any rejection.
pub fn authenticate_bearer(validator: &TokenValidator, token: &str) -> Result<Identity, AuthError> {
    Ok(validator.validate(token).map_err(AuthFailure::from)?)
}

/// Session service.
///
/// Borrowed per request from application state.
pub struct SessionService<'a> {
    accounts: &'a dyn AccountRepository,
    refresh_tokens: &'a RefreshTokenStore,
    signer: &'a TokenSigner,
}

impl<'a> SessionService<'a> {
    /// Create a new session service.
    #[must_use]
    pub const fn new(
        accounts: &'a dyn AccountRepository,
        refresh_tokens: &'a RefreshTokenStore,
        signer: &'a TokenSigner,
    ) -> Self {
        Self {
            accounts,
            refresh_tokens,
            signer,
        }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` when the account does not
    /// exist or the password is wrong, with no way to tell which.
    pub async fn login(&self, email: &str, password: SecretString) -> Result<LoginSession, AuthError> {
        Ok(self.try_login(email, password).await?)
    }

    async fn try_login(&self, email: &str, password: SecretString) -> Result<LoginSession, AuthFailure> {
        let Ok(email) = Email::parse(email) else {
            password::verify_against_dummy(password).await;
            return Err(AuthFailure::MalformedEmail);
        };

        let Some((account, hash)) = self.accounts.find_with_password_hash(&email).await? else {
            password::verify_against_dummy(password).await;
            return Err(AuthFailure::UnknownEmail(email.into_inner()));
        };

        if !password::verify_password(password, hash).await {
            return Err(AuthFailure::WrongPassword(account.id));
        }

        let access = self
            .signer
            .issue(account.id, &account.email, &account.role.name)?;
        let refresh = self.refresh_tokens.issue(account.id).await?;

        tracing::info!(account_id = %account.id, role = %account.role.name, "Login succeeded");

        Ok(LoginSession {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_at: access.expires_at,
            account: AccountSummary::from(&account),
        })
    }

    /// Exchange a refresh token for a new access token, rotating the refresh
    /// token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is unknown, revoked,
    /// expired or was consumed by a concurrent refresh.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedSession, AuthError> {
        Ok(self.try_refresh(refresh_token).await?)
    }

    async fn try_refresh(&self, refresh_token: &str) -> Result<RefreshedSession, AuthFailure> {
        let (previous, replacement) = self.refresh_tokens.rotate(refresh_token).await?;

        let account = self
            .accounts
            .find_by_id(previous.account_id)
            .await?
            .ok_or(AuthFailure::AccountGone(previous.account_id))?;

        let access = self
            .signer
            .issue(account.id, &account.email, &account.role.name)?;

        tracing::info!(account_id = %account.id, "Refresh token rotated");

        Ok(RefreshedSession {
            access_token: access.token,
            refresh_token: replacement.token,
            expires_at: access.expires_at,
        })
    }

    /// Revoke a refresh token. Unknown or already revoked tokens are accepted
    /// silently.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unexpected` only if the store fails.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.refresh_tokens
            .revoke(refresh_token)
            .await
            .map_err(AuthFailure::from)?;
        Ok(())
    }

    /// Revoke every live refresh token of an account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unexpected` only if the store fails.
    pub async fn revoke_all(&self, account_id: AccountId) -> Result<u64, AuthError> {
        let revoked = self
            .refresh_tokens
            .revoke_all(account_id)
            .await
            .map_err(AuthFailure::from)?;
        tracing::info!(%account_id, revoked, "Revoked all refresh tokens");
        Ok(revoked)
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Register a new account on behalf of `actor`.
    ///
    /// Anyone, including an anonymous caller, may register a `Cliente`
    /// account. Every other role requires an `Administrador` actor.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Forbidden` when the actor may not grant the role,
    /// otherwise `AuthError::InvalidEmail`, `AuthError::WeakPassword`,
    /// `AuthError::UnknownRole` or `AuthError::AccountAlreadyExists`.
    pub async fn register(
        &self,
        registration: Registration,
        actor: Option<&Identity>,
    ) -> Result<AccountSummary, AuthError> {
        Ok(self.try_register(registration, actor).await?)
    }

    async fn try_register(
        &self,
        registration: Registration,
        actor: Option<&Identity>,
    ) -> Result<AccountSummary, AuthFailure> {
        let may_grant = registration.role_id == roles::CLIENTE_ID
            || actor.is_some_and(|actor| actor.has_any_role(&[roles::ADMINISTRADOR]));
        if !may_grant {
            tracing::warn!(
                actor = ?actor.map(|actor| actor.account_id),
                role_id = %registration.role_id,
                "Registration rejected: role requires an administrator"
            );
            return Err(AuthFailure::Rejected(AuthError::Forbidden));
        }

        let email = Email::parse(&registration.email)
            .map_err(|e| AuthFailure::Rejected(AuthError::InvalidEmail(e)))?;

        password::validate_password_strength(registration.password.expose_secret())
            .map_err(|msg| AuthFailure::Rejected(AuthError::WeakPassword(msg)))?;

        let password_hash = password::hash_password(registration.password).await?;
        let role_id = registration.role_id;

        let account = self
            .accounts
            .create(NewAccount {
                name: registration.name,
                email,
                password_hash,
                role_id,
                address: registration.address,
                phone: registration.phone,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    AuthFailure::Rejected(AuthError::UnknownRole(role_id))
                }
                other => AuthFailure::Repository(other),
            })?;

        tracing::info!(account_id = %account.id, role = %account.role.name, "Account registered");

        Ok(AccountSummary::from(&account))
    }

    /// Change the caller's password and sign out every other session.
    ///
    /// Returns the number of refresh tokens revoked.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong and
    /// `AuthError::WeakPassword` if `new` fails the strength policy.
    pub async fn change_password(
        &self,
        identity: &Identity,
        current: SecretString,
        new: SecretString,
    ) -> Result<u64, AuthError> {
        Ok(self.try_change_password(identity, current, new).await?)
    }

    async fn try_change_password(
        &self,
        identity: &Identity,
        current: SecretString,
        new: SecretString,
    ) -> Result<u64, AuthFailure> {
        let account_id = identity.account_id;
        let hash = self
            .accounts
            .password_hash(account_id)
            .await?
            .ok_or(AuthFailure::AccountGone(account_id))?;

        if !password::verify_password(current, hash).await {
            return Err(AuthFailure::WrongPassword(account_id));
        }

        password::validate_password_strength(new.expose_secret())
            .map_err(|msg| AuthFailure::Rejected(AuthError::WeakPassword(msg)))?;

        let new_hash = password::hash_password(new).await?;
        self.accounts
            .update_password_hash(account_id, &new_hash)
            .await?;
        let revoked = self.refresh_tokens.revoke_all(account_id).await?;

        tracing::info!(%account_id, revoked, "Password changed");

        Ok(revoked)
    }

    /// Account summary for the authenticated caller.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the account no longer exists.
    pub async fn me(&self, identity: &Identity) -> Result<AccountSummary, AuthError> {
        let account = self
            .accounts
            .find_by_id(identity.account_id)
            .await
            .map_err(AuthFailure::from)?
            .ok_or(AuthFailure::AccountGone(identity.account_id))?;
        Ok(AccountSummary::from(&account))
    }
}
