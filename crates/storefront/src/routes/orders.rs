//! Order history route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use intershop_core::OrderId;

use crate::error::Result;
use crate::middleware::RequireOwner;
use crate::services::OrderDetails;
use crate::state::AppState;

/// All orders of the owner, newest first.
#[instrument(skip(state, owner))]
pub async fn index(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
) -> Result<Json<Vec<OrderDetails>>> {
    Ok(Json(state.orders().orders(&owner).await?))
}

/// One order of the owner.
#[instrument(skip(state, owner))]
pub async fn show(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
    Path(id): Path<i64>,
) -> Result<Json<OrderDetails>> {
    Ok(Json(state.orders().order(&owner, OrderId::new(id)).await?))
}
