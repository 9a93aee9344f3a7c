//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use milo_core::{AccountId, OrderId, OrderStatus};

/// A restaurant order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    /// Customer account, if the order was placed by one.
    pub account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub total: Decimal,
    /// Only changed through the status transition command.
    pub status: OrderStatus,
    pub notes: Option<String>,
}

/// An order enriched with its human-readable status description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWithStatus {
    pub id: OrderId,
    pub account_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub status_description: &'static str,
    pub notes: Option<String>,
}

impl From<Order> for OrderWithStatus {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            account_id: order.account_id,
            created_at: order.created_at,
            total: order.total,
            status: order.status,
            status_description: order.status.description(),
            notes: order.notes,
        }
    }
}

/// One entry of the status catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusInfo {
    pub id: i16,
    pub status: OrderStatus,
    pub name: &'static str,
    pub description: &'static str,
    pub next: &'static [OrderStatus],
}

impl From<OrderStatus> for StatusInfo {
    fn from(status: OrderStatus) -> Self {
        Self {
            id: status.id(),
            status,
            name: status.name(),
            description: status.description(),
            next: status.next_statuses(),
        }
    }
}
