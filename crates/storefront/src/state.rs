//! Application state shared across handlers.

use std::sync::Arc;

use crate::cache::CacheCoordinator;
use crate::config::StorefrontConfig;
use crate::db::{ItemRepository, Repositories};
use crate::payments::PaymentGateway;
use crate::services::{CartManager, CheckoutCoordinator, ItemCatalog, OrderAssembler};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the services, which share one cache and one set of repositories.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    items: Arc<dyn ItemRepository>,
    catalog: ItemCatalog,
    carts: CartManager,
    orders: OrderAssembler,
    checkout: CheckoutCoordinator,
}

impl AppState {
    /// Wire the services together.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `repos` - Repositories (`PostgreSQL` or in-memory)
    /// * `gateway` - Payment service client
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        repos: Repositories,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let cache = CacheCoordinator::new(config.cache.ttl, config.cache.max_capacity);

        let catalog = ItemCatalog::new(repos.items.clone(), repos.carts.clone(), cache.clone());
        let carts = CartManager::new(repos.items.clone(), repos.carts.clone(), cache.clone());
        let orders = OrderAssembler::new(
            repos.items.clone(),
            repos.carts.clone(),
            repos.orders.clone(),
            cache,
        );
        let checkout = CheckoutCoordinator::new(gateway, orders.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                items: repos.items,
                catalog,
                carts,
                orders,
                checkout,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Item repository, used for readiness probes.
    #[must_use]
    pub fn items(&self) -> &dyn ItemRepository {
        self.inner.items.as_ref()
    }

    /// Catalog lookup and search.
    #[must_use]
    pub fn catalog(&self) -> &ItemCatalog {
        &self.inner.catalog
    }

    /// Cart operations.
    #[must_use]
    pub fn carts(&self) -> &CartManager {
        &self.inner.carts
    }

    /// Order creation and history.
    #[must_use]
    pub fn orders(&self) -> &OrderAssembler {
        &self.inner.orders
    }

    /// Checkout.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutCoordinator {
        &self.inner.checkout
    }
}
