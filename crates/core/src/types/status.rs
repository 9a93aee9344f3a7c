//! Order status and its transition table.
//!
//! ```text
//! Pending   -> Preparing | Cancelled
//! Preparing -> Ready     | Cancelled
//! Ready     -> Delivered
//! Delivered -> (terminal)
//! Cancelled -> (terminal)
//! ```
//!
//! Statuses are stored as `SMALLINT` 1..=5 in the `orders.status` column.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a stored or submitted status id is outside 1..=5.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown order status id: {0}")]
pub struct UnknownOrderStatus(pub i16);

/// Lifecycle status of a restaurant order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Received, waiting for the kitchen.
    #[default]
    Pending,
    /// Being prepared in the kitchen.
    Preparing,
    /// Finished, waiting to be served.
    Ready,
    /// Handed to the customer.
    Delivered,
    /// Cancelled before delivery.
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Preparing,
        Self::Ready,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Statuses reachable from `self` in one transition.
    #[must_use]
    pub const fn next_statuses(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Preparing, Self::Cancelled],
            Self::Preparing => &[Self::Ready, Self::Cancelled],
            Self::Ready => &[Self::Delivered],
            Self::Delivered | Self::Cancelled => &[],
        }
    }

    /// Whether moving from `current` to `next` is allowed.
    ///
    /// Self-transitions are never allowed.
    #[must_use]
    pub const fn is_valid_transition(current: Self, next: Self) -> bool {
        matches!(
            (current, next),
            (Self::Pending, Self::Preparing | Self::Cancelled)
                | (Self::Preparing, Self::Ready | Self::Cancelled)
                | (Self::Ready, Self::Delivered)
        )
    }

    /// Method form of [`OrderStatus::is_valid_transition`].
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        Self::is_valid_transition(self, next)
    }

    /// `true` for statuses with no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Numeric id as stored in the database.
    #[must_use]
    pub const fn id(self) -> i16 {
        match self {
            Self::Pending => 1,
            Self::Preparing => 2,
            Self::Ready => 3,
            Self::Delivered => 4,
            Self::Cancelled => 5,
        }
    }

    /// Look up a status by its numeric id.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownOrderStatus`] for ids outside 1..=5.
    pub const fn from_id(id: i16) -> Result<Self, UnknownOrderStatus> {
        match id {
            1 => Ok(Self::Pending),
            2 => Ok(Self::Preparing),
            3 => Ok(Self::Ready),
            4 => Ok(Self::Delivered),
            5 => Ok(Self::Cancelled),
            other => Err(UnknownOrderStatus(other)),
        }
    }

    /// Short display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Preparing => "Preparing",
            Self::Ready => "Ready",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Human-readable description shown to staff and customers.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Pending => "Order received, waiting to be prepared",
            Self::Preparing => "The kitchen is preparing the order",
            Self::Ready => "Order finished, ready to be served",
            Self::Delivered => "Order delivered to the customer",
            Self::Cancelled => "Order cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i16> for OrderStatus {
    type Error = UnknownOrderStatus;

    fn try_from(id: i16) -> Result<Self, Self::Error> {
        Self::from_id(id)
    }
}

impl From<OrderStatus> for i16 {
    fn from(status: OrderStatus) -> Self {
        status.id()
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for OrderStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i16 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i16 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OrderStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i16 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::from_id(id)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for OrderStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i16 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.id(), buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ALLOWED: [(OrderStatus, OrderStatus); 5] = [
        (OrderStatus::Pending, OrderStatus::Preparing),
        (OrderStatus::Pending, OrderStatus::Cancelled),
        (OrderStatus::Preparing, OrderStatus::Ready),
        (OrderStatus::Preparing, OrderStatus::Cancelled),
        (OrderStatus::Ready, OrderStatus::Delivered),
    ];

    #[test]
    fn test_transition_table_is_exact() {
        let mut allowed = 0;
        let mut rejected = 0;
        for current in OrderStatus::ALL {
            for next in OrderStatus::ALL {
                let expected = ALLOWED.contains(&(current, next));
                assert_eq!(
                    OrderStatus::is_valid_transition(current, next),
                    expected,
                    "{current} -> {next}"
                );
                if expected {
                    allowed += 1;
                } else {
                    rejected += 1;
                }
            }
        }
        assert_eq!(allowed, 5);
        assert_eq!(rejected, 20);
    }

    #[test]
    fn test_no_self_transitions() {
        for status in OrderStatus::ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_terminal_statuses_have_no_successors() {
        for status in OrderStatus::ALL {
            assert_eq!(status.is_terminal(), status.next_statuses().is_empty());
        }
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_next_statuses_agree_with_table() {
        for current in OrderStatus::ALL {
            for next in OrderStatus::ALL {
                assert_eq!(
                    current.next_statuses().contains(&next),
                    current.can_transition_to(next)
                );
            }
        }
    }

    #[test]
    fn test_id_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::from_id(status.id()).unwrap(), status);
        }
        assert_eq!(OrderStatus::from_id(0), Err(UnknownOrderStatus(0)));
        assert_eq!(OrderStatus::from_id(6), Err(UnknownOrderStatus(6)));
    }

    #[test]
    fn test_default_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_serde_uses_snake_case_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Delivered).unwrap(),
            "\"delivered\""
        );
        let parsed: OrderStatus = serde_json::from_str("\"preparing\"").unwrap();
        assert_eq!(parsed, OrderStatus::Preparing);
    }
}
