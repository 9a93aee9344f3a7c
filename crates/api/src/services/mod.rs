//! Business services sitting between the routes and the repositories.

pub mod auth;
pub mod orders;

pub use auth::{AuthError, SessionService};
pub use orders::{OrderError, OrderService};
