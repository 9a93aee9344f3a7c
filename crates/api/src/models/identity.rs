//! Request-scoped caller identity.

use milo_core::{AccountId, Email};

/// The authenticated caller, reconstructed from a validated access token.
///
/// Built once per request by the authentication middleware and handed to
/// handlers explicitly; nothing reads it from ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account_id: AccountId,
    pub email: Email,
    pub role: String,
}

/// Outcome of bearer-token validation for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    /// No `Authorization: Bearer` header was sent.
    Anonymous,
    /// The token passed every check.
    Authenticated(Identity),
    /// A token was sent but failed validation.
    Rejected,
}

impl Identity {
    /// Whether the caller holds one of `allowed`.
    #[must_use]
    pub fn has_any_role(&self, allowed: &[&str]) -> bool {
        allowed.contains(&self.role.as_str())
    }
}

impl Authentication {
    /// The identity, only when the token was valid.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Anonymous | Self::Rejected => None,
        }
    }
}
