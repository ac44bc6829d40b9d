//! Request and response bodies for the licensing service.
//!
//! Responses that change entitlement state (`/trial/start`,
//! `/trial/consume`) return the full subscription body, not a delta: the
//! store replaces its snapshot wholesale and never patches counters in
//! place.

use atropos_types::{
    ConsumptionId, DeviceHash, EntitlementSnapshot, Epoch, LicenseToken, SubscriptionStatus,
    TrialQuota,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `GET /billing/subscription` and of the trial mutation endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionBody {
    /// Subscription standing, absent for never-subscribed devices.
    #[serde(default)]
    pub status: Option<SubscriptionStatus>,
    /// Trial counters, absent when no trial was started.
    #[serde(default)]
    pub trial: Option<TrialQuota>,
    /// Current token-invalidation epoch for the device.
    pub epoch: Epoch,
}

impl SubscriptionBody {
    /// Converts the wire body into a snapshot stamped at `fetched_at`.
    #[must_use]
    pub fn into_snapshot(self, fetched_at: DateTime<Utc>) -> EntitlementSnapshot {
        EntitlementSnapshot {
            status: self.status,
            trial: self.trial,
            epoch: self.epoch,
            fetched_at,
        }
    }
}

/// Body of `POST /license/issue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueTokenRequest {
    /// Device requesting the token.
    pub device_hash: DeviceHash,
}

/// Response of `POST /license/issue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTokenResponse {
    /// The opaque token string.
    pub token: String,
    /// Mint time.
    pub issued_at: DateTime<Utc>,
    /// Hard expiry.
    pub expires_at: DateTime<Utc>,
    /// Epoch the token was minted under.
    pub epoch: Epoch,
}

impl IssueTokenResponse {
    /// Converts the wire body into a cached token.
    #[must_use]
    pub fn into_token(self) -> LicenseToken {
        LicenseToken {
            token: self.token,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            epoch: self.epoch,
        }
    }
}

/// Body of `POST /trial/start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialStartRequest {
    /// Device starting its trial.
    pub device_hash: DeviceHash,
}

/// Body of `POST /trial/consume`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialConsumeRequest {
    /// Device consuming a run.
    pub device_hash: DeviceHash,
    /// Idempotency key: the server debits each id at most once, so a
    /// recovered attempt after a crash cannot double-spend.
    pub consumption_id: ConsumptionId,
}

/// Body of `POST /billing/checkout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    /// Device the checkout session is for.
    pub device_hash: DeviceHash,
}

/// Body of `POST /billing/portal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSessionRequest {
    /// Device whose billing account the portal session opens.
    pub device_hash: DeviceHash,
}

/// Response of the checkout and portal endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUrlResponse {
    /// Browser URL the caller should open.
    pub url: String,
}
