//! Repository layer for catalog, cart and order data.
//!
//! # Database: `intershop`
//!
//! ## Tables
//!
//! - `item` - Catalog items (read-only for this service)
//! - `cart_line` - One row per (owner, item) with quantity >= 1
//! - `orders` - Immutable order headers with frozen totals
//! - `order_line` - Order line snapshots with purchase-time prices
//!
//! Each table is reached through a repository trait so the services can run
//! against `PostgreSQL` in production and the in-memory store in development
//! and tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p intershop-cli -- migrate
//! ```

pub mod carts;
pub mod items;
pub mod memory;
pub mod orders;
pub mod seed;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use intershop_core::{
    CartLine, Item, ItemId, NewOrder, NewOrderLine, Order, OrderId, OrderLine, OrderedItem,
    OwnerId, SortMode,
};

pub use carts::PgCartRepository;
pub use items::PgItemRepository;
pub use memory::InMemoryStore;
pub use orders::PgOrderRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate cart line, non-positive quantity).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Backend is unreachable or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One page of catalog search results plus the total match count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogPage {
    /// Items on this page, already sorted.
    pub items: Vec<Item>,
    /// Number of items matching the query across all pages.
    pub total_count: u64,
}

/// Read-only access to catalog items.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Get an item by ID.
    async fn find_by_id(&self, id: ItemId) -> Result<Option<Item>, RepositoryError>;

    /// Search items by case-insensitive substring of title or description.
    ///
    /// A blank query matches all items. `offset`/`limit` window the sorted result.
    async fn search(
        &self,
        query: &str,
        sort: SortMode,
        offset: u64,
        limit: u32,
    ) -> Result<CatalogPage, RepositoryError>;

    /// Items purchased on an order, with purchase quantity and price.
    async fn find_by_order_id(&self, order_id: OrderId)
    -> Result<Vec<OrderedItem>, RepositoryError>;

    /// Cheap connectivity probe used by the readiness endpoint.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Per-owner cart line storage.
///
/// Quantity changes go through [`increment_line`](Self::increment_line) and
/// [`decrement_line`](Self::decrement_line), which are atomic store
/// operations so rapid concurrent mutations never lose an update.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Get the line for (owner, item), if any.
    async fn find_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// All lines of an owner's cart, ordered by item ID.
    async fn list_lines(&self, owner: &OwnerId) -> Result<Vec<CartLine>, RepositoryError>;

    /// Insert or overwrite the line for (owner, item) with an explicit quantity.
    ///
    /// Returns `RepositoryError::Conflict` if `quantity` is zero.
    async fn upsert_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
        quantity: u32,
    ) -> Result<CartLine, RepositoryError>;

    /// Atomically add one unit, creating the line with quantity 1 if absent.
    async fn increment_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
    ) -> Result<CartLine, RepositoryError>;

    /// Atomically remove one unit, deleting the line when it reaches zero.
    ///
    /// Returns the updated line, or `None` if the line was deleted or did not exist.
    async fn decrement_line(
        &self,
        owner: &OwnerId,
        item_id: ItemId,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// Delete the line for (owner, item). Returns `true` if a line was deleted.
    async fn delete_line(&self, owner: &OwnerId, item_id: ItemId)
    -> Result<bool, RepositoryError>;

    /// Delete every line of an owner's cart. Returns the number of lines deleted.
    async fn delete_all_lines(&self, owner: &OwnerId) -> Result<u64, RepositoryError>;

    /// Subtract the given quantities from an owner's lines in one atomic step.
    ///
    /// Lines that reach zero are deleted; units added after the quantities
    /// were read survive. Returns the number of lines deleted.
    async fn remove_quantities(
        &self,
        owner: &OwnerId,
        lines: &[(ItemId, u32)],
    ) -> Result<u64, RepositoryError>;
}

/// Order header and line storage.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist an order header and return it with its generated ID.
    async fn save(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    /// Persist the lines of a previously saved order in one batch.
    async fn save_lines(
        &self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLine>, RepositoryError>;

    /// Delete an order header (and any of its lines).
    ///
    /// Only used to compensate for an order whose lines failed to persist.
    async fn delete(&self, order_id: OrderId) -> Result<bool, RepositoryError>;

    /// Get an order by ID.
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// All orders of an owner, newest first.
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Order>, RepositoryError>;

    /// Lines of an order, ordered by line ID.
    async fn find_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError>;
}

/// The three repositories the services run against.
#[derive(Clone)]
pub struct Repositories {
    pub items: Arc<dyn ItemRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub orders: Arc<dyn OrderRepository>,
}

impl Repositories {
    /// Repositories backed by a `PostgreSQL` pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            items: Arc::new(PgItemRepository::new(pool.clone())),
            carts: Arc::new(PgCartRepository::new(pool.clone())),
            orders: Arc::new(PgOrderRepository::new(pool.clone())),
        }
    }

    /// Repositories backed by one shared in-memory store.
    #[must_use]
    pub fn in_memory(store: &Arc<InMemoryStore>) -> Self {
        Self {
            items: store.clone(),
            carts: store.clone(),
            orders: store.clone(),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Convert a stored quantity column to the domain's unsigned quantity.
pub(crate) fn quantity_from_db(value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| RepositoryError::DataCorruption(format!("invalid quantity {value}")))
}

/// Convert a domain quantity to the stored column type.
pub(crate) fn quantity_to_db(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value).map_err(|_| RepositoryError::Conflict(format!("quantity {value} too large")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_from_db_rejects_non_positive() {
        assert!(matches!(
            quantity_from_db(0),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert!(matches!(
            quantity_from_db(-3),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert!(matches!(quantity_from_db(2), Ok(2)));
    }

    #[test]
    fn test_quantity_to_db_overflow() {
        assert!(matches!(
            quantity_to_db(u32::MAX),
            Err(RepositoryError::Conflict(_))
        ));
        assert!(matches!(quantity_to_db(5), Ok(5)));
    }
}
