//! Licensing and billing service client for Atropos.
//!
//! A thin typed wrapper over the service's REST endpoints. The client does
//! no state management of its own; the access store owns snapshots, tokens,
//! and retry policy. What this crate does own is the error taxonomy: every
//! failure is classified into transport-offline, server-rejected (known
//! codes), or malformed-response, because the store treats those three very
//! differently.

mod client;
mod error;
mod protocol;

pub use client::BillingClient;
pub use error::{ApiError, ApiResult};
pub use protocol::{
    CheckoutSessionRequest, IssueTokenRequest, IssueTokenResponse, PortalSessionRequest,
    SessionUrlResponse, SubscriptionBody, TrialConsumeRequest, TrialStartRequest,
};
