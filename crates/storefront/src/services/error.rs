//! Shop error types.

use thiserror::Error;

use intershop_core::{ItemId, OrderId, OwnerId, Price};

use crate::db::RepositoryError;

/// Errors that can occur in cart, order and checkout operations.
#[derive(Debug, Error)]
pub enum ShopError {
    /// Item does not exist in the catalog.
    #[error("item {0} not found")]
    ItemNotFound(ItemId),

    /// Unknown cart action name.
    #[error("invalid cart action: {0:?}")]
    InvalidAction(String),

    /// Checkout or order creation with no cart lines.
    #[error("cart is empty")]
    EmptyCart,

    /// The order or its lines could not be persisted. No order exists and the
    /// cart is untouched.
    #[error("order could not be saved: {0}")]
    OrderPersistenceFailed(String),

    /// The payment service is unhealthy or unreachable.
    #[error("payment service unavailable: {0}")]
    PaymentServiceUnavailable(String),

    /// Balance does not cover the cart total.
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Price, required: Price },

    /// The payment service refused the debit.
    #[error("payment declined: {0}")]
    PaymentDeclined(String),

    /// Payment was taken but the order could not be created. Needs manual
    /// reconciliation.
    #[error("payment of {amount} taken from {owner} but order creation failed: {reason}")]
    PostPaymentOrderFailure {
        owner: OwnerId,
        amount: Price,
        reason: String,
    },

    /// Order does not exist or belongs to another owner.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// Repository/database error.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}
