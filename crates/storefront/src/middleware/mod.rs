//! HTTP middleware and extractors for the storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! Owner identity is read per handler with the [`RequireOwner`] and
//! [`OptionalOwner`] extractors.

pub mod owner;
pub mod request_id;

pub use owner::{OWNER_HEADER, OptionalOwner, RequireOwner};
pub use request_id::request_id_middleware;
