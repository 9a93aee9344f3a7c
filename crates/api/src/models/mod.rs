//! Domain models for the Milo backend.
//!
//! These types are validated domain objects, separate from the database row
//! types in [`crate::db`].

pub mod account;
pub mod identity;
pub mod order;
pub mod refresh_token;

pub use account::{Account, AccountSummary, NewAccount, Role, roles};
pub use identity::{Authentication, Identity};
pub use order::{Order, OrderWithStatus, StatusInfo};
pub use refresh_token::{NewRefreshToken, RefreshTokenRecord};
