//! Order snapshot types.
//!
//! Orders and their lines are immutable once written: prices are copied from
//! the catalog at checkout time so later catalog changes never affect them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ItemId, OrderId, OrderLineId};
use super::owner::OwnerId;
use super::price::Price;

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order ID.
    pub id: OrderId,
    /// Owner who placed the order.
    pub owner: OwnerId,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// Frozen total (sum of line price × quantity at creation time).
    pub total_price: Price,
}

/// A persisted order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Line ID.
    pub id: OrderLineId,
    /// Order the line belongs to.
    pub order_id: OrderId,
    /// Purchased item.
    pub item_id: ItemId,
    /// Units purchased.
    pub quantity: u32,
    /// Unit price at the time of purchase.
    pub price_per_item: Price,
}

impl OrderLine {
    /// Line total (quantity × unit price at purchase).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price_per_item.times(self.quantity)
    }
}

/// An order line to be written, before the store has assigned IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    /// Purchased item.
    pub item_id: ItemId,
    /// Units purchased.
    pub quantity: u32,
    /// Unit price snapshot.
    pub price_per_item: Price,
}

impl NewOrderLine {
    /// Line total (quantity × unit price).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price_per_item.times(self.quantity)
    }
}

/// An in-memory order snapshot built from a cart, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Owner placing the order.
    pub owner: OwnerId,
    /// Snapshot time.
    pub created_at: DateTime<Utc>,
    /// Sum of the line totals.
    pub total_price: Price,
    /// Order lines.
    pub lines: Vec<NewOrderLine>,
}

impl NewOrder {
    /// Build a snapshot, deriving the total from the lines.
    #[must_use]
    pub fn new(owner: OwnerId, created_at: DateTime<Utc>, lines: Vec<NewOrderLine>) -> Self {
        let total_price = lines.iter().map(NewOrderLine::line_total).sum();
        Self {
            owner,
            created_at,
            total_price,
            lines,
        }
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

/// An item as it appears on a past order (catalog details + purchase snapshot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedItem {
    /// Purchased item.
    pub item_id: ItemId,
    /// Current catalog title.
    pub title: String,
    /// Current catalog image.
    pub img_path: String,
    /// Units purchased.
    pub quantity: u32,
    /// Unit price at the time of purchase.
    pub price_per_item: Price,
}
