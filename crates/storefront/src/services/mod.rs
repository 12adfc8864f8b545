//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `catalog` - Item lookup and paginated, tiled search
//! - `cart` - Cart mutation and cart summary
//! - `orders` - Cart-to-order conversion and order history
//! - `checkout` - Payment-gated checkout
//!
//! Services hold repository trait objects and the shared [`CacheCoordinator`],
//! so they run unchanged against `PostgreSQL` or the in-memory store.
//!
//! [`CacheCoordinator`]: crate::cache::CacheCoordinator

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod orders;

pub use cart::{CartManager, CartSummary};
pub use catalog::{ItemCatalog, SearchPage, SearchQuery};
pub use checkout::CheckoutCoordinator;
pub use error::ShopError;
pub use orders::{OrderAssembler, OrderDetails};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fixtures;
