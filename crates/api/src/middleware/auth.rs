//! Bearer token authentication.
//!
//! [`authenticate`] runs before route dispatch on every request and stores an
//! [`Authentication`] in the request extensions. Handlers then pick the
//! identity up explicitly with [`RequireAuth`] or [`OptionalAuth`].

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::error::{AppError, set_sentry_user};
use crate::models::{Authentication, Identity};
use crate::services::auth::{AuthError, authenticate_bearer};
use crate::state::AppState;

/// Extract the token from `Authorization: Bearer <token>`.
///
/// Returns `None` when the header is absent or uses another scheme.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    scheme
        .eq_ignore_ascii_case("bearer")
        .then_some(token.trim())
}

/// Validate the bearer token, if any, and record the outcome.
///
/// Never rejects on its own: an invalid token on an open endpoint is simply
/// not turned into an identity.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let authentication = match bearer_token(request.headers()) {
        None => Authentication::Anonymous,
        Some(token) => match authenticate_bearer(state.validator(), token) {
            Ok(identity) => {
                set_sentry_user(&identity.account_id, Some(identity.email.as_str()));
                Authentication::Authenticated(identity)
            }
            Err(_) => Authentication::Rejected,
        },
    };

    request.extensions_mut().insert(authentication);
    next.run(request).await
}

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(identity): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", identity.email)
/// }
/// ```
pub struct RequireAuth(pub Identity);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Authentication>() {
            Some(Authentication::Authenticated(identity)) => Ok(Self(identity.clone())),
            _ => Err(AuthError::InvalidToken.into()),
        }
    }
}

/// Reject the caller with 403 unless they hold one of `allowed`.
///
/// # Errors
///
/// Returns `AuthError::Forbidden` for any other role.
pub fn require_any_role(identity: &Identity, allowed: &[&str]) -> Result<(), AppError> {
    if identity.has_any_role(allowed) {
        return Ok(());
    }
    tracing::warn!(
        account_id = %identity.account_id,
        role = %identity.role,
        "Request rejected: role not allowed"
    );
    Err(AuthError::Forbidden.into())
}

/// Extractor that yields the identity only when a valid token was sent.
pub struct OptionalAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<Authentication>()
                .and_then(Authentication::identity)
                .cloned(),
        ))
    }
}
