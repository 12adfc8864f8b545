//! Cart mutation and cart summary.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use intershop_core::{CartAction, CartLine, Item, ItemId, OwnerId, Price};

use crate::cache::CacheCoordinator;
use crate::db::{CartRepository, ItemRepository, RepositoryError};

use super::ShopError;

/// An owner's cart as shown on the cart page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    /// Items in the cart, each with `count` set to its cart quantity.
    pub items: Vec<Item>,
    /// Σ price × count over all items.
    pub total: Price,
    /// Whether the cart has no lines.
    pub is_empty: bool,
}

impl CartSummary {
    /// Build a summary from decorated items.
    #[must_use]
    pub fn from_items(items: Vec<Item>) -> Self {
        let total = items.iter().map(|item| item.price.times(item.count)).sum();
        Self {
            is_empty: items.is_empty(),
            items,
            total,
        }
    }
}

/// Cached lookup of the line for (owner, item).
pub(crate) async fn cached_line(
    cache: &CacheCoordinator,
    carts: &dyn CartRepository,
    owner: &OwnerId,
    item_id: ItemId,
) -> Result<Option<CartLine>, RepositoryError> {
    cache
        .cart_line(owner, item_id, || carts.find_line(owner, item_id))
        .await
}

/// Cached lookup of an undecorated catalog item.
pub(crate) async fn cached_item(
    cache: &CacheCoordinator,
    items: &dyn ItemRepository,
    item_id: ItemId,
) -> Result<Option<Item>, RepositoryError> {
    cache.item(item_id, || items.find_by_id(item_id)).await
}

/// Per-owner cart operations.
#[derive(Clone)]
pub struct CartManager {
    items: Arc<dyn ItemRepository>,
    carts: Arc<dyn CartRepository>,
    cache: CacheCoordinator,
}

impl CartManager {
    /// Create a new cart manager.
    #[must_use]
    pub fn new(
        items: Arc<dyn ItemRepository>,
        carts: Arc<dyn CartRepository>,
        cache: CacheCoordinator,
    ) -> Self {
        Self {
            items,
            carts,
            cache,
        }
    }

    /// Apply one cart action for (owner, item).
    ///
    /// Returns the line after the mutation, or `None` if the line no longer
    /// exists. Decreasing or removing an absent line is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::ItemNotFound` when increasing an unknown item, or
    /// `ShopError::Repository` if the store fails. Nothing is evicted on error.
    #[instrument(skip(self), fields(owner = %owner, item_id = %item_id, action = %action))]
    pub async fn mutate(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
        action: CartAction,
    ) -> Result<Option<CartLine>, ShopError> {
        let line = match action {
            CartAction::Plus => match self.carts.increment_line(owner, item_id).await {
                Ok(line) => Some(line),
                Err(RepositoryError::NotFound) => return Err(ShopError::ItemNotFound(item_id)),
                Err(e) => return Err(e.into()),
            },
            CartAction::Minus => self.carts.decrement_line(owner, item_id).await?,
            CartAction::Delete => {
                self.carts.delete_line(owner, item_id).await?;
                None
            }
        };

        self.cache.evict_cart_line(owner, item_id).await;
        self.cache.evict_cart_summary(owner).await;

        debug!(quantity = line.as_ref().map_or(0, |l| l.quantity), "Cart mutated");
        Ok(line)
    }

    /// Parse `action` and apply it.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::InvalidAction` for an unknown action name, before
    /// touching the store. Otherwise as [`mutate`](Self::mutate).
    pub async fn mutate_raw(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
        action: &str,
    ) -> Result<Option<CartLine>, ShopError> {
        let action =
            CartAction::parse(action).map_err(|e| ShopError::InvalidAction(e.0))?;
        self.mutate(owner, item_id, action).await
    }

    /// The line for (owner, item), read through the cache.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Repository` if the store fails.
    pub async fn line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
    ) -> Result<Option<CartLine>, ShopError> {
        Ok(cached_line(&self.cache, self.carts.as_ref(), owner, item_id).await?)
    }

    /// The owner's cart summary, read through the cache.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Repository` if the store fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn summary(&self, owner: &OwnerId) -> Result<CartSummary, ShopError> {
        self.cache
            .cart_summary(owner, || self.load_summary(owner))
            .await
    }

    async fn load_summary(&self, owner: &OwnerId) -> Result<CartSummary, ShopError> {
        let lines = self.carts.list_lines(owner).await?;
        let mut items = Vec::with_capacity(lines.len());

        for line in lines {
            match cached_item(&self.cache, self.items.as_ref(), line.item_id).await? {
                Some(item) => items.push(item.with_count(line.quantity)),
                None => warn!(item_id = %line.item_id, "Cart line references missing item"),
            }
        }

        Ok(CartSummary::from_items(items))
    }
}
