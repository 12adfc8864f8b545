//! Payment service collaborator.
//!
//! The checkout pipeline only sees the [`PaymentGateway`] trait. The
//! production implementation is [`HttpPaymentGateway`], which talks to the
//! payment service over HTTP.

mod client;

use async_trait::async_trait;
use thiserror::Error;

use intershop_core::{OwnerId, Price};

pub use client::HttpPaymentGateway;

/// Errors talking to the payment service.
///
/// A refused debit is not an error; it is reported as [`DebitOutcome::Failed`].
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Transport failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a status the contract does not allow.
    #[error("unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// The response body did not match the contract.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Result of a debit request the service processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitOutcome {
    /// The amount was debited.
    Success {
        /// Balance after the debit, when reported.
        new_balance: Option<Price>,
    },
    /// Nothing was debited.
    Failed {
        /// Reason reported by the service.
        reason: String,
    },
}

impl DebitOutcome {
    /// Whether the debit went through.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Remote balance and payment service.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Whether the service is reachable and healthy. Never fails; an
    /// unreachable service is simply unhealthy.
    async fn health_check(&self) -> bool;

    /// Current balance of `owner`.
    async fn balance(&self, owner: &OwnerId) -> Result<Price, PaymentError>;

    /// Debit exactly `amount` from `owner`.
    async fn debit(&self, owner: &OwnerId, amount: Price) -> Result<DebitOutcome, PaymentError>;
}
