//! HTTP API of the payment service.
//!
//! # Routes
//!
//! - `GET /health` - liveness
//! - `GET /payments/balance/{user_id}` - current balance
//! - `POST /payments` - debit; `200` with `SUCCESS` or `400` with `FAILED`

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use sentry_tower::{NewSentryLayer, SentryHttpLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use intershop_core::{BalanceResponse, PaymentRequest, PaymentResponse};

use crate::store::{BalanceStore, DebitError};

/// Shared handler state.
pub type SharedStore = Arc<dyn BalanceStore>;

/// Build the service router with tracing and Sentry layers.
pub fn app(store: SharedStore) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/payments/balance/{user_id}", get(balance))
        .route("/payments", post(pay))
        .layer(TraceLayer::new_for_http())
        .layer(NewSentryLayer::new_from_top())
        .layer(SentryHttpLayer::new().enable_transaction())
        .with_state(store)
}

async fn health() -> &'static str {
    "Payment Service is running"
}

#[instrument(skip(store))]
async fn balance(
    State(store): State<SharedStore>,
    Path(user_id): Path<String>,
) -> Json<BalanceResponse> {
    let balance = store.balance(&user_id).await;
    Json(BalanceResponse { user_id, balance })
}

#[instrument(skip(store, request), fields(user_id = %request.user_id, amount = %request.amount))]
async fn pay(
    State(store): State<SharedStore>,
    Json(request): Json<PaymentRequest>,
) -> impl IntoResponse {
    match store.debit(&request.user_id, request.amount).await {
        Ok(new_balance) => {
            info!(%new_balance, "Payment processed");
            (
                StatusCode::OK,
                Json(PaymentResponse::success(
                    request.user_id,
                    request.amount,
                    new_balance,
                )),
            )
        }
        Err(e) => {
            info!(reason = %e, "Payment refused");
            let reason = match &e {
                DebitError::UserNotFound(_) => "User not found".to_string(),
                DebitError::InsufficientFunds { .. } => "Insufficient funds".to_string(),
                DebitError::InvalidAmount(_) => e.to_string(),
            };
            (
                StatusCode::BAD_REQUEST,
                Json(PaymentResponse::failed(request.user_id, request.amount, reason)),
            )
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use intershop_core::{PaymentStatus, Price};
    use tower::ServiceExt;

    use super::*;
    use crate::store::InMemoryBalanceStore;

    fn router() -> Router {
        app(Arc::new(InMemoryBalanceStore::seeded(Price::from_cents(300_000))))
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn pay_request(user_id: &str, amount: &str) -> Request<Body> {
        Request::post("/payments")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(
                r#"{{"user_id":"{user_id}","amount":"{amount}"}}"#
            )))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_balance() {
        let response = router()
            .oneshot(Request::get("/payments/balance/user2").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: BalanceResponse = body_json(response).await;
        assert_eq!(body.user_id, "user2");
        assert_eq!(body.balance, Price::from_cents(230_050));
    }

    #[tokio::test]
    async fn test_successful_payment() {
        let response = router().oneshot(pay_request("user1", "100.00")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: PaymentResponse = body_json(response).await;
        assert_eq!(body.status, PaymentStatus::Success);
        assert_eq!(body.new_balance, Some(Price::from_cents(140_000)));
    }

    #[tokio::test]
    async fn test_refused_payments() {
        let app = router();

        let response = app.clone().oneshot(pay_request("user3", "1000.00")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: PaymentResponse = body_json(response).await;
        assert_eq!(body.status, PaymentStatus::Failed);
        assert_eq!(body.reason.as_deref(), Some("Insufficient funds"));

        let response = app.oneshot(pay_request("ghost", "1.00")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: PaymentResponse = body_json(response).await;
        assert_eq!(body.reason.as_deref(), Some("User not found"));
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let response = router()
            .oneshot(
                Request::post("/payments")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"user_id":"user1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
