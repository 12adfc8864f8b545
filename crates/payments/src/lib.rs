//! Intershop payment service library.
//!
//! Holds account balances and debits them on request. The storefront calls
//! it over HTTP during checkout:
//!
//! - `GET /health`
//! - `GET /payments/balance/{user_id}`
//! - `POST /payments`
//!
//! Balances live in memory. Known demo accounts are seeded at startup and any
//! other account gets a random opening balance the first time it is queried.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod routes;
pub mod store;

pub use config::{ConfigError, PaymentsConfig};
pub use routes::app;
pub use store::{BalanceStore, DebitError, InMemoryBalanceStore};
