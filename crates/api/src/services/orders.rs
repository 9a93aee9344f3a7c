//! Order status command path.
//!
//! The transition table itself lives in [`milo_core::OrderStatus`]; this
//! service applies it to stored orders. The write is a compare-and-set on the
//! status column, so of two concurrent transitions on one order only the first
//! to commit succeeds and the other is judged against the status it lost to.

use thiserror::Error;

use milo_core::{OrderId, OrderStatus};

use crate::db::{OrderRepository, RepositoryError};
use crate::models::{OrderWithStatus, StatusInfo};

/// Maximum length of order notes, in characters.
pub const MAX_NOTES_LENGTH: usize = 500;

/// Errors returned by order status changes.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("cannot change order status from {current} to {requested}")]
    InvalidTransition {
        current: OrderStatus,
        requested: OrderStatus,
    },

    /// Another request moved the order between our read and our write.
    #[error("order changed to {current} concurrently; {requested} from {expected} was not applied")]
    ConcurrentChange {
        expected: OrderStatus,
        current: OrderStatus,
        requested: OrderStatus,
    },

    #[error("notes must be at most {MAX_NOTES_LENGTH} characters")]
    NotesTooLong,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Every status with its metadata and successors, in lifecycle order.
#[must_use]
pub fn status_catalogue() -> Vec<StatusInfo> {
    OrderStatus::ALL.into_iter().map(StatusInfo::from).collect()
}

/// Order service.
pub struct OrderService<'a> {
    orders: &'a dyn OrderRepository,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(orders: &'a dyn OrderRepository) -> Self {
        Self { orders }
    }

    /// Move an order to `next`, optionally replacing its notes.
    ///
    /// Non-empty notes replace the stored notes exactly as given, surrounding
    /// whitespace included; `None` or an empty string leaves them untouched.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist,
    /// `OrderError::InvalidTransition` if the table forbids the move from the
    /// order's current status and `OrderError::ConcurrentChange` if another
    /// change committed first. The losing request is not retried.
    pub async fn change_status(
        &self,
        id: OrderId,
        next: OrderStatus,
        notes: Option<&str>,
    ) -> Result<OrderWithStatus, OrderError> {
        let notes = notes.filter(|n| !n.is_empty());
        if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_LENGTH) {
            return Err(OrderError::NotesTooLong);
        }

        let order = self
            .orders
            .find_by_id(id)
            .await?
            .ok_or(OrderError::NotFound(id))?;

        ensure_transition(order.status, next)?;

        let Some(updated) = self
            .orders
            .update_status_if(id, order.status, next, notes)
            .await?
        else {
            // Lost the race: judge the request against what is stored now.
            let current = self
                .orders
                .find_by_id(id)
                .await?
                .ok_or(OrderError::NotFound(id))?
                .status;
            tracing::info!(
                order_id = %id,
                expected = %order.status,
                %current,
                requested = %next,
                "Concurrent status change detected"
            );
            return Err(OrderError::ConcurrentChange {
                expected: order.status,
                current,
                requested: next,
            });
        };

        tracing::info!(order_id = %id, from = %order.status, to = %next, "Order status changed");

        Ok(updated.into())
    }
}

fn ensure_transition(current: OrderStatus, requested: OrderStatus) -> Result<(), OrderError> {
    if current.can_transition_to(requested) {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition { current, requested })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message_names_both_statuses() {
        let err = ensure_transition(OrderStatus::Pending, OrderStatus::Delivered).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Pending"));
        assert!(message.contains("Delivered"));
    }

    #[test]
    fn test_terminal_statuses_reject_every_target() {
        for current in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            for requested in OrderStatus::ALL {
                assert!(matches!(
                    ensure_transition(current, requested),
                    Err(OrderError::InvalidTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn test_catalogue_lists_every_status_in_order() {
        let catalogue = status_catalogue();
        let ids: Vec<i16> = catalogue.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(catalogue[0].next, &[OrderStatus::Preparing, OrderStatus::Cancelled]);
        assert!(catalogue[3].next.is_empty());
    }
}
