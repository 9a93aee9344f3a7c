//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::db::Repositories;
use crate::services::auth::{RefreshTokenStore, SessionService, TokenSigner, TokenValidator};
use crate::services::orders::OrderService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The signer and validator are
/// built once from the configuration and never change afterwards.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    repositories: Repositories,
    refresh_tokens: RefreshTokenStore,
    signer: TokenSigner,
    validator: TokenValidator,
}

impl AppState {
    /// Create application state backed by `PostgreSQL`.
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        Self::with_repositories(config, Repositories::postgres(pool))
    }

    /// Create application state over an arbitrary repository set.
    #[must_use]
    pub fn with_repositories(config: ApiConfig, repositories: Repositories) -> Self {
        let signer = TokenSigner::new(&config.jwt);
        let validator = TokenValidator::new(&config.jwt);
        let refresh_tokens =
            RefreshTokenStore::new(repositories.refresh_tokens.clone(), config.refresh_token_ttl);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                repositories,
                refresh_tokens,
                signer,
                validator,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the repositories.
    #[must_use]
    pub fn repositories(&self) -> &Repositories {
        &self.inner.repositories
    }

    /// Get a reference to the access token validator.
    #[must_use]
    pub fn validator(&self) -> &TokenValidator {
        &self.inner.validator
    }

    /// Session service over this state's repositories.
    #[must_use]
    pub fn sessions(&self) -> SessionService<'_> {
        SessionService::new(
            self.inner.repositories.accounts.as_ref(),
            &self.inner.refresh_tokens,
            &self.inner.signer,
        )
    }

    /// Order service over this state's repositories.
    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(self.inner.repositories.orders.as_ref())
    }
}
