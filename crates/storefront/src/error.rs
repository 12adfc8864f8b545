//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::ShopError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart, order or checkout operation failed.
    #[error("{0}")]
    Shop(#[from] ShopError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        Self::Shop(ShopError::Repository(err))
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Shop(err) => match err {
                ShopError::ItemNotFound(_) | ShopError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                ShopError::InvalidAction(_) => StatusCode::BAD_REQUEST,
                ShopError::EmptyCart => StatusCode::CONFLICT,
                ShopError::InsufficientFunds { .. } | ShopError::PaymentDeclined(_) => {
                    StatusCode::PAYMENT_REQUIRED
                }
                ShopError::PaymentServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ShopError::OrderPersistenceFailed(_)
                | ShopError::PostPaymentOrderFailure { .. }
                | ShopError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Internal details are never exposed.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Shop(err) => match err {
                ShopError::ItemNotFound(_)
                | ShopError::OrderNotFound(_)
                | ShopError::InvalidAction(_)
                | ShopError::PaymentDeclined(_) => err.to_string(),
                ShopError::EmptyCart => "Cart is empty".to_string(),
                ShopError::InsufficientFunds { balance, required } => {
                    format!("Insufficient funds: balance {balance}, order total {required}")
                }
                ShopError::PaymentServiceUnavailable(_) => {
                    "Payment service is unavailable, please try again later".to_string()
                }
                ShopError::PostPaymentOrderFailure { .. } => {
                    "Payment was taken but the order could not be created; support has been notified"
                        .to_string()
                }
                ShopError::OrderPersistenceFailed(_) | ShopError::Repository(_) => {
                    "Internal server error".to_string()
                }
            },
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry. Post-payment failures are captured
        // where they happen, with full context.
        if status.is_server_error()
            && !matches!(self, Self::Shop(ShopError::PostPaymentOrderFailure { .. }))
        {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = json!({ "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request's owner.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Cart mutated", Some(&[("item_id", "5")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use intershop_core::{ItemId, OrderId, OwnerId, Price};

    use super::*;

    fn status_of(err: ShopError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 7".to_string());
        assert_eq!(err.to_string(), "Not found: order 7");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_shop_error_status_codes() {
        assert_eq!(status_of(ShopError::ItemNotFound(ItemId::new(1))), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ShopError::OrderNotFound(OrderId::new(1))), StatusCode::NOT_FOUND);
        assert_eq!(status_of(ShopError::InvalidAction("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ShopError::EmptyCart), StatusCode::CONFLICT);
        assert_eq!(
            status_of(ShopError::InsufficientFunds {
                balance: Price::from_cents(50_075),
                required: Price::from_cents(100_000),
            }),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(status_of(ShopError::PaymentDeclined("no".into())), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(
            status_of(ShopError::PaymentServiceUnavailable("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ShopError::OrderPersistenceFailed("disk".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::from(ShopError::OrderPersistenceFailed("pg: connection reset".into()));
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::from(ShopError::PostPaymentOrderFailure {
            owner: OwnerId::parse("user1").unwrap(),
            amount: Price::from_cents(100),
            reason: "pg: connection reset".into(),
        });
        assert!(!err.public_message().contains("pg:"));
    }

    #[test]
    fn test_insufficient_funds_message_shows_amounts() {
        let err = AppError::from(ShopError::InsufficientFunds {
            balance: Price::from_cents(50_075),
            required: Price::from_cents(100_000),
        });
        assert_eq!(
            err.public_message(),
            "Insufficient funds: balance 500.75, order total 1000.00"
        );
    }
}
