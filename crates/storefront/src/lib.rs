//! Intershop storefront library.
//!
//! Catalog search, per-owner carts, payment-gated checkout and order history
//! behind a JSON API. The binary in `main.rs` wires configuration, telemetry
//! and the HTTP server around this library so the whole pipeline can be
//! tested in-process.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;
