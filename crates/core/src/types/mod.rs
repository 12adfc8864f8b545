//! Core types for Intershop.
//!
//! This module provides type-safe wrappers for the catalog, cart and order domain.

pub mod cart;
pub mod catalog;
pub mod id;
pub mod order;
pub mod owner;
pub mod payment;
pub mod price;

pub use cart::{CartAction, CartActionError, CartLine};
pub use catalog::{Item, Paging, SortMode, TILE_WIDTH, tile};
pub use id::*;
pub use order::{NewOrder, NewOrderLine, Order, OrderLine, OrderedItem};
pub use owner::{OwnerId, OwnerIdError};
pub use payment::{BalanceResponse, PaymentRequest, PaymentResponse, PaymentStatus};
pub use price::Price;
