//! Authentication route handlers.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use milo_core::RoleId;

use crate::error::Result;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{AccountSummary, roles};
use crate::services::auth::{LoginSession, RefreshedSession, Registration};
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

// Request bodies carrying secrets deliberately do not derive `Debug`.

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Defaults to `Cliente`; any other role needs an administrator token.
    #[serde(default)]
    pub role_id: Option<RoleId>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of refresh and logout.
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    /// Seconds until `expires_at`.
    pub expires_in: i64,
}

impl TokenResponse {
    fn new(access_token: String, refresh_token: &SecretString, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            refresh_token: refresh_token.expose_secret().to_owned(),
            token_type: "Bearer",
            expires_at,
            expires_in: (expires_at - Utc::now()).num_seconds().max(0),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenResponse,
    pub account: AccountSummary,
}

impl From<LoginSession> for LoginResponse {
    fn from(session: LoginSession) -> Self {
        Self {
            tokens: TokenResponse::new(
                session.access_token,
                &session.refresh_token,
                session.expires_at,
            ),
            account: session.account,
        }
    }
}

impl From<RefreshedSession> for TokenResponse {
    fn from(session: RefreshedSession) -> Self {
        Self::new(
            session.access_token,
            &session.refresh_token,
            session.expires_at,
        )
    }
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordResponse {
    pub revoked_sessions: u64,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a new account.
pub async fn register(
    State(state): State<AppState>,
    OptionalAuth(actor): OptionalAuth,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let registration = Registration {
        name: request.name,
        email: request.email,
        password: SecretString::from(request.password),
        role_id: request.role_id.unwrap_or(roles::CLIENTE_ID),
        address: request.address,
        phone: request.phone,
    };
    let account = state
        .sessions()
        .register(registration, actor.as_ref())
        .await?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// Log in with email and password.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let session = state
        .sessions()
        .login(&request.email, SecretString::from(request.password))
        .await?;

    Ok(Json(session.into()))
}

/// Exchange a refresh token for a new token pair.
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>> {
    let session = state
        .sessions()
        .refresh(&request.refresh_token)
        .await?;

    Ok(Json(session.into()))
}

/// Revoke a refresh token.
pub async fn logout(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<StatusCode> {
    state
        .sessions()
        .logout(&request.refresh_token)
        .await?;

    tracing::info!(account_id = %identity.account_id, "Logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// Current account summary.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<AccountSummary>> {
    Ok(Json(state.sessions().me(&identity).await?))
}

/// Change the caller's password.
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<ChangePasswordResponse>> {
    let revoked_sessions = state
        .sessions()
        .change_password(
            &identity,
            SecretString::from(request.current_password),
            SecretString::from(request.new_password),
        )
        .await?;

    Ok(Json(ChangePasswordResponse { revoked_sessions }))
}
