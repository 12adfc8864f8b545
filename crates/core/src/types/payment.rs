//! Wire types of the payment service API.
//!
//! Shared by the payment service and the storefront's gateway client so both
//! ends agree on the JSON shape.

use serde::{Deserialize, Serialize};

use super::price::Price;

/// Response of `GET /payments/balance/{user_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// Account holder.
    pub user_id: String,
    /// Current balance.
    pub balance: Price,
}

/// Body of `POST /payments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Account to debit.
    pub user_id: String,
    /// Amount to debit.
    pub amount: Price,
}

/// Outcome of a debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Amount was debited.
    Success,
    /// Nothing was debited.
    Failed,
}

/// Response of `POST /payments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResponse {
    /// Debit outcome.
    pub status: PaymentStatus,
    /// Account that was (or was not) debited.
    pub user_id: String,
    /// Requested amount.
    pub amount: Price,
    /// Balance after a successful debit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<Price>,
    /// Why a debit failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PaymentResponse {
    /// Successful debit leaving `new_balance`.
    #[must_use]
    pub fn success(user_id: impl Into<String>, amount: Price, new_balance: Price) -> Self {
        Self {
            status: PaymentStatus::Success,
            user_id: user_id.into(),
            amount,
            new_balance: Some(new_balance),
            reason: None,
        }
    }

    /// Refused debit.
    #[must_use]
    pub fn failed(user_id: impl Into<String>, amount: Price, reason: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Failed,
            user_id: user_id.into(),
            amount,
            new_balance: None,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_response_shape() {
        let response = PaymentResponse::failed("user3", Price::from_cents(100_000), "Insufficient funds");
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["amount"], "1000.00");
        assert_eq!(json["reason"], "Insufficient funds");
        assert!(json.get("new_balance").is_none());
    }

    #[test]
    fn test_success_response_parses() {
        let json = r#"{"status":"SUCCESS","user_id":"user1","amount":"100.00","new_balance":"1400.00"}"#;
        let response: PaymentResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.status, PaymentStatus::Success);
        assert_eq!(response.new_balance, Some(Price::from_cents(140_000)));
        assert!(response.reason.is_none());
    }
}
