//! End-to-end test harness for Intershop.
//!
//! Starts the payment service and the storefront on ephemeral local ports.
//! The storefront runs on the in-memory store seeded with the demo catalog
//! and talks to the payment service through the real HTTP gateway client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p intershop-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use intershop_core::{ItemId, OwnerId, Price};
use intershop_payments::InMemoryBalanceStore;
use intershop_storefront::config::StorefrontConfig;
use intershop_storefront::db::{InMemoryStore, Repositories, seed};
use intershop_storefront::payments::HttpPaymentGateway;
use intershop_storefront::state::AppState;
use reqwest::{Client, RequestBuilder};
use url::Url;

/// Header carrying the caller's identity.
pub const USER_HEADER: &str = "x-user";

/// Errors while starting the harness.
pub type HarnessError = Box<dyn std::error::Error + Send + Sync>;

/// Serve `app` on an ephemeral port and return its address.
///
/// # Errors
///
/// Returns an error if no local port can be bound.
pub async fn spawn(app: Router) -> Result<SocketAddr, HarnessError> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(addr)
}

/// Start the payment service with the demo accounts.
///
/// # Errors
///
/// Returns an error if no local port can be bound.
pub async fn spawn_payments() -> Result<SocketAddr, HarnessError> {
    let store = Arc::new(InMemoryBalanceStore::seeded(Price::from_cents(300_000)));
    spawn(intershop_payments::app(store)).await
}

/// A running storefront wired to a payment service.
pub struct TestContext {
    pub client: Client,
    pub storefront_url: Url,
    pub payments_url: Url,
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
}

impl TestContext {
    /// Start a payment service and a storefront that uses it.
    ///
    /// # Errors
    ///
    /// Returns an error if a server cannot start.
    pub async fn start() -> Result<Self, HarnessError> {
        let payments = spawn_payments().await?;
        Self::with_payments_url(Url::parse(&format!("http://{payments}"))?).await
    }

    /// Start a storefront pointed at `payments_url`, which may be unreachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the storefront cannot start.
    pub async fn with_payments_url(payments_url: Url) -> Result<Self, HarnessError> {
        let config = StorefrontConfig::from_lookup(|_| None)?;
        let store = Arc::new(InMemoryStore::new());
        seed::seed_memory(&store).await;

        let gateway = HttpPaymentGateway::new(payments_url.clone(), Duration::from_secs(2))?;
        let state = AppState::new(config, Repositories::in_memory(&store), Arc::new(gateway));

        let addr = spawn(intershop_storefront::routes::app(state.clone())).await?;

        Ok(Self {
            client: Client::new(),
            storefront_url: Url::parse(&format!("http://{addr}"))?,
            payments_url,
            store,
            state,
        })
    }

    /// Full URL of a storefront path.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid relative URL.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn url(&self, path: &str) -> Url {
        self.storefront_url.join(path).expect("valid path")
    }

    /// GET a storefront path as `user`.
    #[must_use]
    pub fn get(&self, path: &str, user: &str) -> RequestBuilder {
        self.client.get(self.url(path)).header(USER_HEADER, user)
    }

    /// POST to a storefront path as `user`.
    #[must_use]
    pub fn post(&self, path: &str, user: &str) -> RequestBuilder {
        self.client.post(self.url(path)).header(USER_HEADER, user)
    }

    /// Id of the demo item with this title.
    ///
    /// # Panics
    ///
    /// Panics if the demo catalog has no such item.
    #[allow(clippy::expect_used)]
    pub async fn item_id(&self, title: &str) -> ItemId {
        let page = self
            .state
            .catalog()
            .search(
                intershop_storefront::services::SearchQuery {
                    search: title.to_string(),
                    page_size: 100,
                    ..Default::default()
                },
                None,
            )
            .await
            .expect("search");
        page.rows
            .iter()
            .flatten()
            .find(|item| item.title == title)
            .map(|item| item.id)
            .expect("demo item")
    }

    /// Add `units` of an item to `user`'s cart through the service layer.
    ///
    /// # Panics
    ///
    /// Panics if a cart mutation fails.
    #[allow(clippy::expect_used)]
    pub async fn fill_cart(&self, user: &str, item: ItemId, units: u32) {
        let owner = OwnerId::parse(user).expect("owner id");
        for _ in 0..units {
            self.state
                .carts()
                .mutate(&owner, item, intershop_core::CartAction::Plus)
                .await
                .expect("cart mutation");
        }
    }
}
