//! Account balances.
//!
//! `BalanceStore` is the seam the HTTP layer talks to. The only
//! implementation keeps balances in a map behind an async mutex, so a debit
//! reads and writes a balance as one step and two concurrent debits can never
//! both spend the same money.

use std::collections::HashMap;

use async_trait::async_trait;
use intershop_core::Price;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;
use tokio::sync::Mutex;

/// Accounts present at startup.
pub const SEEDED_BALANCES: &[(&str, i64)] = &[
    ("user1", 150_000),
    ("user2", 230_050),
    ("user3", 50_075),
];

/// Why a debit was refused. Nothing is debited in any of these cases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebitError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Price, requested: Price },

    #[error("Invalid amount: {0}")]
    InvalidAmount(Price),
}

/// Storage of account balances.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Current balance. Unknown accounts are opened with a generated balance.
    async fn balance(&self, user_id: &str) -> Price;

    /// Debit `amount` and return the new balance.
    async fn debit(&self, user_id: &str, amount: Price) -> Result<Price, DebitError>;
}

/// In-memory balances.
pub struct InMemoryBalanceStore {
    balances: Mutex<HashMap<String, Price>>,
    /// Exclusive upper bound of generated balances, in cents.
    random_max_cents: i64,
}

impl InMemoryBalanceStore {
    /// Empty store; generated balances fall in `[0, random_max)`.
    #[must_use]
    pub fn new(random_max: Price) -> Self {
        let random_max_cents = (random_max.amount() * Decimal::ONE_HUNDRED)
            .trunc()
            .to_i64()
            .unwrap_or(0)
            .max(0);

        Self {
            balances: Mutex::new(HashMap::new()),
            random_max_cents,
        }
    }

    /// Store holding the demo accounts.
    #[must_use]
    pub fn seeded(random_max: Price) -> Self {
        let mut store = Self::new(random_max);
        *store.balances.get_mut() = SEEDED_BALANCES
            .iter()
            .map(|(user, cents)| ((*user).to_string(), Price::from_cents(*cents)))
            .collect();
        store
    }

    fn opening_balance(&self) -> Price {
        if self.random_max_cents == 0 {
            return Price::ZERO;
        }
        Price::from_cents(rand::rng().random_range(0..self.random_max_cents))
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    async fn balance(&self, user_id: &str) -> Price {
        let mut balances = self.balances.lock().await;
        if let Some(balance) = balances.get(user_id) {
            return *balance;
        }

        let balance = self.opening_balance();
        tracing::info!(user_id, %balance, "Opened account with generated balance");
        balances.insert(user_id.to_string(), balance);
        balance
    }

    async fn debit(&self, user_id: &str, amount: Price) -> Result<Price, DebitError> {
        if amount.is_negative() {
            return Err(DebitError::InvalidAmount(amount));
        }

        let mut balances = self.balances.lock().await;
        let balance = balances
            .get_mut(user_id)
            .ok_or_else(|| DebitError::UserNotFound(user_id.to_string()))?;

        let remaining = balance
            .checked_sub(amount)
            .ok_or(DebitError::InsufficientFunds {
                balance: *balance,
                requested: amount,
            })?;
        *balance = remaining;
        Ok(remaining)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn store() -> InMemoryBalanceStore {
        InMemoryBalanceStore::seeded(Price::from_cents(300_000))
    }

    #[tokio::test]
    async fn test_seeded_balances() {
        let store = store();
        assert_eq!(store.balance("user1").await, Price::from_cents(150_000));
        assert_eq!(store.balance("user2").await, Price::from_cents(230_050));
        assert_eq!(store.balance("user3").await, Price::from_cents(50_075));
    }

    #[tokio::test]
    async fn test_unknown_user_gets_stable_random_balance() {
        let store = store();
        let first = store.balance("newcomer").await;

        assert!(first >= Price::ZERO && first < Price::from_cents(300_000));
        assert_eq!(first, first.round_to_cents());
        assert_eq!(store.balance("newcomer").await, first);
    }

    #[tokio::test]
    async fn test_debit() {
        let store = store();
        let rest = store.debit("user1", Price::from_cents(10_000)).await.unwrap();
        assert_eq!(rest, Price::from_cents(140_000));
        assert_eq!(store.balance("user1").await, Price::from_cents(140_000));
    }

    #[tokio::test]
    async fn test_debit_whole_balance() {
        let store = store();
        let rest = store.debit("user3", Price::from_cents(50_075)).await.unwrap();
        assert_eq!(rest, Price::ZERO);
    }

    #[tokio::test]
    async fn test_refused_debits_change_nothing() {
        let store = store();

        let err = store.debit("user3", Price::from_cents(100_000)).await.unwrap_err();
        assert_eq!(
            err,
            DebitError::InsufficientFunds {
                balance: Price::from_cents(50_075),
                requested: Price::from_cents(100_000),
            }
        );
        assert_eq!(store.balance("user3").await, Price::from_cents(50_075));

        let err = store.debit("ghost", Price::from_cents(1)).await.unwrap_err();
        assert_eq!(err, DebitError::UserNotFound("ghost".to_string()));

        let err = store.debit("user1", Price::from_cents(-1)).await.unwrap_err();
        assert!(matches!(err, DebitError::InvalidAmount(_)));
        assert_eq!(store.balance("user1").await, Price::from_cents(150_000));
    }

    #[tokio::test]
    async fn test_zero_max_opens_empty_accounts() {
        let store = InMemoryBalanceStore::new(Price::ZERO);
        assert_eq!(store.balance("anyone").await, Price::ZERO);
    }

    #[tokio::test]
    async fn test_concurrent_debits_never_overspend() {
        let store = Arc::new(store());
        // user3 holds 500.75; twenty debits of 100.00 can succeed at most five times.
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.debit("user3", Price::from_cents(10_000)).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 5);
        assert_eq!(store.balance("user3").await, Price::from_cents(75));
    }
}
