//! Order repository backed by `PostgreSQL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use milo_core::{AccountId, OrderId, OrderStatus};

use super::{OrderRepository, RepositoryError};
use crate::models::Order;

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    account_id: Option<AccountId>,
    created_at: DateTime<Utc>,
    total: Decimal,
    status: i16,
    notes: Option<String>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::from_id(row.status).map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            account_id: row.account_id,
            created_at: row.created_at,
            total: row.total,
            status,
            notes: row.notes,
        })
    }
}

/// Repository for order database operations.
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, account_id, created_at, total, status, notes
            FROM orders
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn update_status_if(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        notes: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError> {
        // Single-row guarded write: a concurrent transition that committed
        // first makes the WHERE clause miss.
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            UPDATE orders
            SET status = $3, notes = COALESCE($4, notes)
            WHERE id = $1 AND status = $2
            RETURNING id, account_id, created_at, total, status, notes
            ",
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }
}
