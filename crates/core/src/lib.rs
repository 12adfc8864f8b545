//! Intershop Core - Shared domain types.
//!
//! This crate provides the types used across all Intershop components:
//! - `storefront` - Catalog, cart, order and checkout services
//! - `payments` - Balance and debit service
//! - `cli` - Migrations and demo data
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, owner identity, prices, catalog, cart and order records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
