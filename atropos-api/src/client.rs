//! HTTP client for the licensing service.

use crate::error::{ApiError, ApiResult};
use crate::protocol::{
    CheckoutSessionRequest, IssueTokenRequest, IssueTokenResponse, PortalSessionRequest,
    SessionUrlResponse, SubscriptionBody, TrialConsumeRequest, TrialStartRequest,
};
use atropos_types::{ConsumptionId, DeviceHash};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Client for the licensing/billing REST service.
#[derive(Debug, Clone)]
pub struct BillingClient {
    base_url: String,
    http: Client,
}

impl BillingClient {
    /// Creates a client for the service at `base_url`.
    ///
    /// The base URL comes from configuration so tests can point it at a
    /// local mock server.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Fetches the entitlement verdict for a device.
    ///
    /// A 404 means the service has no record of the device. That is a
    /// normal "no entitlement" answer, not an error.
    pub async fn fetch_subscription(
        &self,
        device: &DeviceHash,
    ) -> ApiResult<Option<SubscriptionBody>> {
        debug!(device = %device, "fetching subscription");
        let response = self
            .http
            .get(format!("{}/billing/subscription", self.base_url))
            .query(&[("device_hash", device.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::parse(response).await?;
        Ok(Some(body))
    }

    /// Requests a fresh license token for a device.
    pub async fn issue_token(&self, device: &DeviceHash) -> ApiResult<IssueTokenResponse> {
        debug!(device = %device, "issuing license token");
        let response = self
            .http
            .post(format!("{}/license/issue", self.base_url))
            .json(&IssueTokenRequest {
                device_hash: device.clone(),
            })
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Starts the trial for a device; returns the updated entitlement.
    pub async fn start_trial(&self, device: &DeviceHash) -> ApiResult<SubscriptionBody> {
        debug!(device = %device, "starting trial");
        let response = self
            .http
            .post(format!("{}/trial/start", self.base_url))
            .json(&TrialStartRequest {
                device_hash: device.clone(),
            })
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Consumes one trial run; returns the updated entitlement.
    ///
    /// `consumption_id` is the journaled idempotency key; resending the
    /// same id after a crash debits the run at most once.
    pub async fn consume_trial_run(
        &self,
        device: &DeviceHash,
        consumption_id: ConsumptionId,
    ) -> ApiResult<SubscriptionBody> {
        debug!(device = %device, id = %consumption_id, "consuming trial run");
        let response = self
            .http
            .post(format!("{}/trial/consume", self.base_url))
            .json(&TrialConsumeRequest {
                device_hash: device.clone(),
                consumption_id,
            })
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Creates a checkout session; returns the URL to open in a browser.
    pub async fn create_checkout_session(
        &self,
        device: &DeviceHash,
    ) -> ApiResult<SessionUrlResponse> {
        let response = self
            .http
            .post(format!("{}/billing/checkout", self.base_url))
            .json(&CheckoutSessionRequest {
                device_hash: device.clone(),
            })
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Creates a billing portal session; returns the URL to open.
    pub async fn create_portal_session(
        &self,
        device: &DeviceHash,
    ) -> ApiResult<SessionUrlResponse> {
        let response = self
            .http
            .post(format!("{}/billing/portal", self.base_url))
            .json(&PortalSessionRequest {
                device_hash: device.clone(),
            })
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Decodes a 2xx body or classifies the status into an error.
    async fn parse<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status.as_u16(), message))
    }
}
