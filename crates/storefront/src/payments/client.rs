//! HTTP client for the payment service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument, warn};
use url::Url;

use intershop_core::{
    BalanceResponse, OwnerId, PaymentRequest, PaymentResponse, PaymentStatus, Price,
};

use super::{DebitOutcome, PaymentError, PaymentGateway};

/// [`PaymentGateway`] backed by the payment service's HTTP API.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpPaymentGateway {
    /// Create a client for the service at `base_url`.
    ///
    /// Every request (connect included) is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, PaymentError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| PaymentError::Parse(format!("base URL {} cannot have a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self))]
    async fn health_check(&self) -> bool {
        let url = match self.endpoint(&["health"]) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Invalid payment service URL");
                return false;
            }
        };

        match self.client.get(url).send().await {
            Ok(response) => {
                let healthy = response.status().is_success();
                debug!(status = %response.status(), healthy, "Payment service health check");
                healthy
            }
            Err(e) => {
                warn!(error = %e, "Payment service unreachable");
                false
            }
        }
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn balance(&self, owner: &OwnerId) -> Result<Price, PaymentError> {
        let url = self.endpoint(&["payments", "balance", owner.as_str()])?;
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = error_body(response).await;
            return Err(PaymentError::UnexpectedStatus {
                status: status.as_u16(),
                message,
            });
        }

        let body: BalanceResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        debug!(balance = %body.balance, "Fetched balance");
        Ok(body.balance)
    }

    #[instrument(skip(self), fields(owner = %owner, amount = %amount))]
    async fn debit(&self, owner: &OwnerId, amount: Price) -> Result<DebitOutcome, PaymentError> {
        let url = self.endpoint(&["payments"])?;
        let request = PaymentRequest {
            user_id: owner.as_str().to_owned(),
            amount,
        };

        let response = self.client.post(url).json(&request).send().await?;
        let status = response.status();

        // 200 and 400 both carry a PaymentResponse; anything else is off-contract.
        if status != StatusCode::OK && status != StatusCode::BAD_REQUEST {
            let message = error_body(response).await;
            return Err(PaymentError::UnexpectedStatus {
                status: status.as_u16(),
                message,
            });
        }

        let body: PaymentResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        Ok(match body.status {
            PaymentStatus::Success => DebitOutcome::Success {
                new_balance: body.new_balance,
            },
            PaymentStatus::Failed => DebitOutcome::Failed {
                reason: body
                    .reason
                    .unwrap_or_else(|| format!("payment refused with status {status}")),
            },
        })
    }
}

/// Body of an off-contract response, for the error message.
async fn error_body(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "Failed to read payment service error body");
            String::new()
        }
    }
}
