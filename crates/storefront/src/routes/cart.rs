//! Cart and checkout route handlers.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use intershop_core::Order;

use crate::error::Result;
use crate::middleware::RequireOwner;
use crate::services::CartSummary;
use crate::state::AppState;

/// The owner's cart summary.
#[instrument(skip(state, owner))]
pub async fn show(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
) -> Result<Json<CartSummary>> {
    Ok(Json(state.carts().summary(&owner).await?))
}

/// Pay for the cart and create an order.
#[instrument(skip(state, owner))]
pub async fn buy(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
) -> Result<(StatusCode, Json<Order>)> {
    let order = state.checkout().checkout(&owner).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
