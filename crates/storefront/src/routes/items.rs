//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use intershop_core::{Item, ItemId, SortMode};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::{OptionalOwner, RequireOwner};
use crate::services::{SearchPage, SearchQuery};
use crate::state::AppState;

/// Query parameters of the search page.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
}

impl From<SearchParams> for SearchQuery {
    fn from(params: SearchParams) -> Self {
        let defaults = Self::default();
        Self {
            search: params.search.unwrap_or_default(),
            sort: params.sort.as_deref().map_or(SortMode::No, SortMode::parse),
            page_number: params.page_number.unwrap_or(defaults.page_number),
            page_size: params.page_size.unwrap_or(defaults.page_size),
        }
    }
}

/// Body of a cart mutation.
#[derive(Debug, Deserialize)]
pub struct CartActionForm {
    pub action: String,
}

/// Cart quantity of one item after a mutation.
#[derive(Debug, Serialize)]
pub struct CartActionResponse {
    pub item_id: ItemId,
    pub count: u32,
}

/// Search page, decorated for the viewer.
#[instrument(skip(state, owner))]
pub async fn index(
    State(state): State<AppState>,
    OptionalOwner(owner): OptionalOwner,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPage>> {
    let page = state
        .catalog()
        .search(params.into(), owner.as_ref())
        .await?;
    Ok(Json(page))
}

/// Item detail, decorated for the viewer.
#[instrument(skip(state, owner))]
pub async fn show(
    State(state): State<AppState>,
    OptionalOwner(owner): OptionalOwner,
    Path(id): Path<i64>,
) -> Result<Json<Item>> {
    let item = state
        .catalog()
        .get_item(ItemId::new(id), owner.as_ref())
        .await?;
    Ok(Json(item))
}

/// Apply a cart action to one item.
#[instrument(skip(state, owner, form), fields(action = %form.action))]
pub async fn mutate(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
    Path(id): Path<i64>,
    Json(form): Json<CartActionForm>,
) -> Result<Json<CartActionResponse>> {
    let item_id = ItemId::new(id);
    let line = state
        .carts()
        .mutate_raw(&owner, item_id, &form.action)
        .await?;

    let id_str = id.to_string();
    add_breadcrumb(
        "cart",
        "Cart mutated",
        Some(&[("item_id", id_str.as_str()), ("action", form.action.as_str())]),
    );

    Ok(Json(CartActionResponse {
        item_id,
        count: line.map_or(0, |l| l.quantity),
    }))
}
