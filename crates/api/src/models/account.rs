//! Account domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use milo_core::{AccountId, Email, RoleId};

/// Seeded role names, as stored in `roles.name` and carried in the `role`
/// claim.
pub mod roles {
    use milo_core::RoleId;

    pub const ADMINISTRADOR: &str = "Administrador";
    pub const MESERO: &str = "Mesero";
    pub const CLIENTE: &str = "Cliente";

    /// Role given to self-registered accounts.
    pub const CLIENTE_ID: RoleId = RoleId::new(3);

    /// Roles that may move orders through the kitchen workflow.
    pub const STAFF: &[&str] = &[ADMINISTRADOR, MESERO];
}

/// A role an account belongs to (e.g. `Administrador`, `Mesero`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    /// Role ID.
    pub id: RoleId,
    /// Role name, carried verbatim in the access token `role` claim.
    pub name: String,
}

/// A registered account.
///
/// The password hash is deliberately not part of this type; it is only ever
/// read alongside the account by the credential lookup.
#[derive(Debug, Clone)]
pub struct Account {
    /// Unique account ID.
    pub id: AccountId,
    /// Display name.
    pub name: String,
    /// Login email (unique).
    pub email: Email,
    /// Assigned role.
    pub role: Role,
    /// Optional delivery address.
    pub address: Option<String>,
    /// Optional phone number.
    pub phone: Option<String>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: Email,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub role_id: RoleId,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Client-facing account summary returned by login and `/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub name: String,
    pub email: Email,
    pub role: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role.name.clone(),
            address: account.address.clone(),
            phone: account.phone.clone(),
        }
    }
}
