//! Shared fixtures for service tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use intershop_core::{ItemId, OwnerId, Price};

use crate::cache::CacheCoordinator;
use crate::db::InMemoryStore;
use crate::payments::{DebitOutcome, PaymentError, PaymentGateway};

use super::{CartManager, CheckoutCoordinator, ItemCatalog, OrderAssembler};

pub fn owner(name: &str) -> OwnerId {
    OwnerId::parse(name).unwrap()
}

/// In-memory store with three items and services wired to it.
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub cache: CacheCoordinator,
    pub catalog: ItemCatalog,
    pub carts: CartManager,
    pub orders: OrderAssembler,
    /// 10.00
    pub ball: ItemId,
    /// 25.50, matches "light" by description only
    pub lamp: ItemId,
    /// 4.50
    pub mug: ItemId,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let ball = store
            .insert_item("Ball", "Red rubber ball", "ball.jpg", Price::from_cents(1000), 10)
            .await
            .id;
        let lamp = store
            .insert_item("Lamp", "Desk light", "lamp.jpg", Price::from_cents(2550), 3)
            .await
            .id;
        let mug = store
            .insert_item("Mug", "Ceramic mug", "mug.jpg", Price::from_cents(450), 20)
            .await
            .id;

        let cache = CacheCoordinator::default();
        let catalog = ItemCatalog::new(store.clone(), store.clone(), cache.clone());
        let carts = CartManager::new(store.clone(), store.clone(), cache.clone());
        let orders = OrderAssembler::new(store.clone(), store.clone(), store.clone(), cache.clone());

        Self {
            store,
            cache,
            catalog,
            carts,
            orders,
            ball,
            lamp,
            mug,
        }
    }

    pub fn checkout(&self, gateway: Arc<FakeGateway>) -> CheckoutCoordinator {
        CheckoutCoordinator::new(gateway, self.orders.clone())
    }
}

#[derive(Default)]
struct GatewayState {
    healthy: bool,
    balances: HashMap<OwnerId, Price>,
    debits: Vec<(OwnerId, Price)>,
    decline: Option<String>,
}

/// Payment gateway double with the payment service's seeded balances.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<GatewayState>,
}

impl FakeGateway {
    pub fn seeded() -> Arc<Self> {
        let gateway = Self::default();
        {
            let mut state = gateway.state.lock().unwrap();
            state.healthy = true;
            state.balances.insert(owner("user1"), Price::from_cents(150_000));
            state.balances.insert(owner("user2"), Price::from_cents(230_050));
            state.balances.insert(owner("user3"), Price::from_cents(50_075));
        }
        Arc::new(gateway)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state.lock().unwrap().healthy = healthy;
    }

    pub fn decline_with(&self, reason: &str) {
        self.state.lock().unwrap().decline = Some(reason.to_owned());
    }

    pub fn balance_of(&self, who: &OwnerId) -> Option<Price> {
        self.state.lock().unwrap().balances.get(who).copied()
    }

    pub fn debits(&self) -> Vec<(OwnerId, Price)> {
        self.state.lock().unwrap().debits.clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn health_check(&self) -> bool {
        self.state.lock().unwrap().healthy
    }

    async fn balance(&self, who: &OwnerId) -> Result<Price, PaymentError> {
        Ok(self.balance_of(who).unwrap_or(Price::ZERO))
    }

    async fn debit(&self, who: &OwnerId, amount: Price) -> Result<DebitOutcome, PaymentError> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = state.decline.clone() {
            return Ok(DebitOutcome::Failed { reason });
        }

        let balance = state.balances.get(who).copied().unwrap_or(Price::ZERO);
        let Some(rest) = balance.checked_sub(amount) else {
            return Ok(DebitOutcome::Failed {
                reason: "Insufficient funds".to_owned(),
            });
        };

        state.balances.insert(who.clone(), rest);
        state.debits.push((who.clone(), amount));
        Ok(DebitOutcome::Success {
            new_balance: Some(rest),
        })
    }
}
