//! HTTP route handlers for the storefront JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (store reachable)
//!
//! # Catalog
//! GET  /items                  - Search page (?search&sort&page_number&page_size)
//! GET  /items/{id}             - Item detail
//! POST /items/{id}             - Cart mutation {"action": "plus" | "minus" | "delete"}
//!
//! # Cart & checkout (requires X-User)
//! GET  /cart                   - Cart summary
//! POST /buy                    - Checkout, returns the new order
//!
//! # Orders (requires X-User)
//! GET  /orders                 - Order history
//! GET  /orders/{id}            - Order detail
//! ```

pub mod cart;
pub mod items;
pub mod orders;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create the item routes router.
pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(items::index))
        .route("/{id}", get(items::show).post(items::mutate))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/items", item_routes())
        .route("/cart", get(cart::show))
        .route("/buy", post(cart::buy))
        .nest("/orders", order_routes())
}

/// Build the complete application with state and middleware.
pub fn app(state: AppState) -> Router {
    routes()
        .with_state(state)
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.items().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
