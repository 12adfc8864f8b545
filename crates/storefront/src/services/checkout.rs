//! Payment-gated checkout.
//!
//! Order of operations:
//!
//! 1. payment service health check
//! 2. read-only cart preview (total)
//! 3. balance check
//! 4. debit of exactly the previewed total
//! 5. order creation from the same cart snapshot
//!
//! Nothing is written before step 4. A failure after the debit is reported
//! as `PostPaymentOrderFailure` for manual reconciliation; it is never
//! retried or refunded automatically.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::{error, info, instrument, warn};

use intershop_core::{Order, OwnerId};

use crate::payments::{DebitOutcome, PaymentGateway};

use super::{OrderAssembler, ShopError};

/// Per-owner async locks so one owner's checkouts run one at a time.
#[derive(Default)]
struct OwnerLocks {
    locks: Mutex<HashMap<OwnerId, Weak<tokio::sync::Mutex<()>>>>,
}

impl OwnerLocks {
    fn get(&self, owner: &OwnerId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = locks.get(owner).and_then(Weak::upgrade) {
            return lock;
        }

        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        locks.insert(owner.clone(), Arc::downgrade(&lock));
        lock
    }
}

/// Orchestrates payment and order creation.
#[derive(Clone)]
pub struct CheckoutCoordinator {
    gateway: Arc<dyn PaymentGateway>,
    assembler: OrderAssembler,
    locks: Arc<OwnerLocks>,
}

impl CheckoutCoordinator {
    /// Create a new checkout coordinator.
    #[must_use]
    pub fn new(gateway: Arc<dyn PaymentGateway>, assembler: OrderAssembler) -> Self {
        Self {
            gateway,
            assembler,
            locks: Arc::new(OwnerLocks::default()),
        }
    }

    /// Pay for the owner's cart and turn it into an order.
    ///
    /// # Errors
    ///
    /// - `PaymentServiceUnavailable` if the payment service is down
    /// - `EmptyCart` if there is nothing to buy
    /// - `InsufficientFunds` if the balance does not cover the total
    /// - `PaymentDeclined` if the service refused the debit
    /// - `PostPaymentOrderFailure` if the debit succeeded but the order failed
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn checkout(&self, owner: &OwnerId) -> Result<Order, ShopError> {
        let lock = self.locks.get(owner);
        let _guard = lock.lock().await;

        if !self.gateway.health_check().await {
            warn!("Payment service unhealthy");
            return Err(ShopError::PaymentServiceUnavailable(
                "health check failed".to_owned(),
            ));
        }

        let draft = self.assembler.preview(owner).await?;
        let total = draft.total_price;

        let balance = self.gateway.balance(owner).await.map_err(|e| {
            warn!(error = %e, "Balance query failed");
            ShopError::PaymentServiceUnavailable(e.to_string())
        })?;

        if balance < total {
            info!(%balance, %total, "Insufficient funds");
            return Err(ShopError::InsufficientFunds {
                balance,
                required: total,
            });
        }

        match self.gateway.debit(owner, total).await {
            Ok(DebitOutcome::Success { new_balance }) => {
                info!(%total, new_balance = ?new_balance, "Payment taken");
            }
            Ok(DebitOutcome::Failed { reason }) => {
                info!(%reason, "Payment declined");
                return Err(ShopError::PaymentDeclined(reason));
            }
            Err(e) => {
                // Outcome unknown; surfaces as unavailability and is logged loudly.
                error!(error = %e, %total, "Debit request failed");
                return Err(ShopError::PaymentServiceUnavailable(e.to_string()));
            }
        }

        match self.assembler.create_order_matching(owner, &draft).await {
            Ok(order) => Ok(order),
            Err(e) => {
                let failure = ShopError::PostPaymentOrderFailure {
                    owner: owner.clone(),
                    amount: total,
                    reason: e.to_string(),
                };
                let event_id = sentry::capture_error(&failure);
                error!(
                    error = %failure,
                    sentry_event_id = %event_id,
                    "Order creation failed after payment, needs reconciliation"
                );
                Err(failure)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use intershop_core::{CartAction, Price};

    use super::*;
    use crate::db::CartRepository;
    use crate::db::memory::Fault;
    use crate::services::fixtures::{FakeGateway, Fixture, owner};

    async fn cart_worth(fx: &Fixture, who: &OwnerId, units: u32) {
        // Ball costs 10.00
        for _ in 0..units {
            fx.carts.mutate(who, fx.ball, CartAction::Plus).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_successful_checkout() {
        let fx = Fixture::new().await;
        let gateway = FakeGateway::seeded();
        let checkout = fx.checkout(gateway.clone());
        let user1 = owner("user1");
        cart_worth(&fx, &user1, 10).await;

        let order = checkout.checkout(&user1).await.unwrap();

        assert_eq!(order.total_price, Price::from_cents(10_000));
        assert_eq!(gateway.balance_of(&user1), Some(Price::from_cents(140_000)));
        assert_eq!(gateway.debits(), vec![(user1.clone(), Price::from_cents(10_000))]);
        assert!(fx.carts.summary(&user1).await.unwrap().is_empty);
    }

    #[tokio::test]
    async fn test_insufficient_funds_changes_nothing() {
        let fx = Fixture::new().await;
        let gateway = FakeGateway::seeded();
        let checkout = fx.checkout(gateway.clone());
        let user3 = owner("user3");
        cart_worth(&fx, &user3, 100).await;

        let result = checkout.checkout(&user3).await;

        assert!(matches!(
            result,
            Err(ShopError::InsufficientFunds { balance, required })
                if balance == Price::from_cents(50_075) && required == Price::from_cents(100_000)
        ));
        assert!(gateway.debits().is_empty());
        assert_eq!(fx.store.order_count().await, 0);
        let line = fx.carts.line(&user3, fx.ball).await.unwrap();
        assert_eq!(line.map(|l| l.quantity), Some(100));
    }

    #[tokio::test]
    async fn test_unhealthy_gateway() {
        let fx = Fixture::new().await;
        let gateway = FakeGateway::seeded();
        gateway.set_healthy(false);
        let checkout = fx.checkout(gateway.clone());
        let user1 = owner("user1");
        cart_worth(&fx, &user1, 1).await;

        let result = checkout.checkout(&user1).await;

        assert!(matches!(result, Err(ShopError::PaymentServiceUnavailable(_))));
        assert!(gateway.debits().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let fx = Fixture::new().await;
        let gateway = FakeGateway::seeded();
        let checkout = fx.checkout(gateway.clone());

        let result = checkout.checkout(&owner("user1")).await;

        assert!(matches!(result, Err(ShopError::EmptyCart)));
        assert!(gateway.debits().is_empty());
    }

    #[tokio::test]
    async fn test_declined_debit() {
        let fx = Fixture::new().await;
        let gateway = FakeGateway::seeded();
        gateway.decline_with("card frozen");
        let checkout = fx.checkout(gateway.clone());
        let user1 = owner("user1");
        cart_worth(&fx, &user1, 1).await;

        let result = checkout.checkout(&user1).await;

        assert!(matches!(result, Err(ShopError::PaymentDeclined(r)) if r == "card frozen"));
        assert_eq!(fx.store.order_count().await, 0);
        assert_eq!(fx.store.list_lines(&user1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_order_failure_after_payment_is_reported() {
        let fx = Fixture::new().await;
        let gateway = FakeGateway::seeded();
        let checkout = fx.checkout(gateway.clone());
        let user1 = owner("user1");
        cart_worth(&fx, &user1, 1).await;
        fx.store.set_fault(Fault::SaveOrderLines, true);

        let result = checkout.checkout(&user1).await;

        assert!(matches!(
            result,
            Err(ShopError::PostPaymentOrderFailure { amount, .. }) if amount == Price::from_cents(1000)
        ));
        // Exactly one debit; no retry.
        assert_eq!(gateway.debits().len(), 1);
        assert_eq!(fx.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_charge_once() {
        let fx = Fixture::new().await;
        let gateway = FakeGateway::seeded();
        let checkout = fx.checkout(gateway.clone());
        let user1 = owner("user1");
        cart_worth(&fx, &user1, 10).await;

        let (a, b) = tokio::join!(checkout.checkout(&user1), checkout.checkout(&user1));

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        assert_eq!(gateway.debits().len(), 1);
        assert_eq!(fx.store.order_count().await, 1);
    }
}
