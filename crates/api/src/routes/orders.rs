//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use milo_core::{OrderId, OrderStatus};

use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAuth, require_any_role};
use crate::models::{OrderWithStatus, StatusInfo, roles};
use crate::services::orders::status_catalogue;
use crate::state::AppState;

/// Requested status, either by numeric id (1..=5) or by name.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum StatusSelector {
    Id(i16),
    Name(OrderStatus),
}

impl TryFrom<StatusSelector> for OrderStatus {
    type Error = AppError;

    fn try_from(selector: StatusSelector) -> Result<Self> {
        match selector {
            StatusSelector::Name(status) => Ok(status),
            StatusSelector::Id(id) => {
                Self::from_id(id).map_err(|e| AppError::BadRequest(e.to_string()))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: StatusSelector,
    pub notes: Option<String>,
}

/// Every order status with its description and successors.
pub async fn statuses(OptionalAuth(identity): OptionalAuth) -> Json<Vec<StatusInfo>> {
    tracing::debug!(
        account_id = ?identity.map(|identity| identity.account_id),
        "Status catalogue requested"
    );
    Json(status_catalogue())
}

/// Move an order to a new status. Staff only.
pub async fn change_status(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<OrderId>,
    Json(request): Json<ChangeStatusRequest>,
) -> Result<Json<OrderWithStatus>> {
    require_any_role(&identity, roles::STAFF)?;
    let next = OrderStatus::try_from(request.status)?;

    tracing::debug!(
        account_id = %identity.account_id,
        order_id = %id,
        requested = %next,
        "Order status change requested"
    );

    let order = state
        .orders()
        .change_status(id, next, request.notes.as_deref())
        .await?;

    Ok(Json(order))
}
