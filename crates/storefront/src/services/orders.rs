//! Cart-to-order conversion and order history.
//!
//! Order creation always reads the cart and prices from the store, never from
//! the cache, so the frozen total reflects the authoritative state at the
//! moment of conversion.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use intershop_core::{NewOrder, NewOrderLine, Order, OrderId, OrderedItem, OwnerId};

use crate::cache::CacheCoordinator;
use crate::db::{CartRepository, ItemRepository, OrderRepository};

use super::ShopError;

/// An order together with the items bought on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    /// Order header.
    #[serde(flatten)]
    pub order: Order,
    /// Ordered items with purchase quantity and price.
    pub items: Vec<OrderedItem>,
}

/// Converts carts into orders and serves order history.
#[derive(Clone)]
pub struct OrderAssembler {
    items: Arc<dyn ItemRepository>,
    carts: Arc<dyn CartRepository>,
    orders: Arc<dyn OrderRepository>,
    cache: CacheCoordinator,
}

impl OrderAssembler {
    /// Create a new order assembler.
    #[must_use]
    pub fn new(
        items: Arc<dyn ItemRepository>,
        carts: Arc<dyn CartRepository>,
        orders: Arc<dyn OrderRepository>,
        cache: CacheCoordinator,
    ) -> Self {
        Self {
            items,
            carts,
            orders,
            cache,
        }
    }

    /// Price the owner's current cart without changing anything.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::EmptyCart` if the cart has no lines,
    /// `ShopError::ItemNotFound` if a line references a missing item, or
    /// `ShopError::Repository` if the store fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn preview(&self, owner: &OwnerId) -> Result<NewOrder, ShopError> {
        let lines = self.carts.list_lines(owner).await?;
        if lines.is_empty() {
            return Err(ShopError::EmptyCart);
        }

        let mut order_lines = Vec::with_capacity(lines.len());
        for line in lines {
            let item = self
                .items
                .find_by_id(line.item_id)
                .await?
                .ok_or(ShopError::ItemNotFound(line.item_id))?;

            order_lines.push(NewOrderLine {
                item_id: line.item_id,
                quantity: line.quantity,
                price_per_item: item.price,
            });
        }

        Ok(NewOrder::new(owner.clone(), Utc::now(), order_lines))
    }

    /// Convert the owner's current cart into an order.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::EmptyCart` for an empty cart, or
    /// `ShopError::OrderPersistenceFailed` if the order could not be stored.
    /// On any error the cart is left as it was and no order exists.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn create_order(&self, owner: &OwnerId) -> Result<Order, ShopError> {
        let draft = self.preview(owner).await?;
        self.persist(draft).await
    }

    /// Convert the owner's cart into an order, provided it still holds the
    /// same items in the same quantities as `expected`.
    ///
    /// Used after payment: the order is stored with the prices of `expected`,
    /// which are the prices that were charged, even if the catalog changed
    /// in the meantime.
    ///
    /// # Errors
    ///
    /// As [`create_order`](Self::create_order), plus
    /// `ShopError::OrderPersistenceFailed` if the cart contents changed since
    /// `expected` was taken.
    #[instrument(skip(self, expected), fields(owner = %owner, total = %expected.total_price))]
    pub async fn create_order_matching(
        &self,
        owner: &OwnerId,
        expected: &NewOrder,
    ) -> Result<Order, ShopError> {
        let current = self.carts.list_lines(owner).await?;
        let unchanged = current.len() == expected.lines.len()
            && current.iter().zip(&expected.lines).all(|(line, wanted)| {
                line.item_id == wanted.item_id && line.quantity == wanted.quantity
            });
        if !unchanged {
            warn!(
                expected_lines = expected.lines.len(),
                current_lines = current.len(),
                "Cart changed during checkout"
            );
            return Err(ShopError::OrderPersistenceFailed(
                "cart changed during checkout".to_owned(),
            ));
        }
        self.persist(expected.clone()).await
    }

    async fn persist(&self, draft: NewOrder) -> Result<Order, ShopError> {
        let owner = &draft.owner;

        let order = self.orders.save(&draft).await.map_err(|e| {
            error!(error = %e, "Failed to save order");
            ShopError::OrderPersistenceFailed(e.to_string())
        })?;

        if let Err(e) = self.orders.save_lines(order.id, &draft.lines).await {
            error!(order_id = %order.id, error = %e, "Failed to save order lines");
            self.discard(order.id).await;
            return Err(ShopError::OrderPersistenceFailed(e.to_string()));
        }

        // Only the converted quantities leave the cart; anything added since
        // the cart was read stays for the next order.
        let converted: Vec<_> = draft
            .lines
            .iter()
            .map(|line| (line.item_id, line.quantity))
            .collect();
        if let Err(e) = self.carts.remove_quantities(owner, &converted).await {
            error!(order_id = %order.id, error = %e, "Failed to clear cart after order");
            self.discard(order.id).await;
            return Err(ShopError::OrderPersistenceFailed(e.to_string()));
        }

        self.cache.evict_cart_summary(owner).await;
        self.cache.evict_owner_cart_lines(owner);
        self.cache.evict_search_pages();

        info!(
            order_id = %order.id,
            total = %order.total_price,
            quantity = draft.total_quantity(),
            "Order created"
        );
        Ok(order)
    }

    /// Compensating delete of an order that must not exist.
    async fn discard(&self, order_id: OrderId) {
        match self.orders.delete(order_id).await {
            Ok(_) => warn!(order_id = %order_id, "Discarded incomplete order"),
            Err(e) => {
                let event_id = sentry::capture_error(&e);
                error!(
                    order_id = %order_id,
                    error = %e,
                    sentry_event_id = %event_id,
                    "Failed to discard incomplete order"
                );
            }
        }
    }

    /// All orders of an owner, newest first, with their items.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Repository` if the store fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn orders(&self, owner: &OwnerId) -> Result<Vec<OrderDetails>, ShopError> {
        let orders = self.orders.list_by_owner(owner).await?;
        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.items.find_by_order_id(order.id).await?;
            details.push(OrderDetails { order, items });
        }
        Ok(details)
    }

    /// One order of an owner with its items.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::OrderNotFound` if the order does not exist or
    /// belongs to someone else.
    #[instrument(skip(self), fields(owner = %owner, order_id = %order_id))]
    pub async fn order(&self, owner: &OwnerId, order_id: OrderId) -> Result<OrderDetails, ShopError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .filter(|order| &order.owner == owner)
            .ok_or(ShopError::OrderNotFound(order_id))?;

        let items = self.items.find_by_order_id(order.id).await?;
        Ok(OrderDetails { order, items })
    }
}
