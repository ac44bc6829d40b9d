//! Core type definitions for the Atropos access layer.
//!
//! This crate holds the pure data model shared by the service client and the
//! access store:
//! - Identifier newtypes (device hash, entitlement epoch, consumption id)
//! - The entitlement snapshot and the access mode derived from it
//! - License token validity rules
//! - Offline grace-period arithmetic
//!
//! Nothing in here performs I/O. Functions that depend on the current time
//! take an explicit `now` so callers (and tests) control the clock.

mod entitlement;
mod grace;
mod ids;
mod token;

pub use entitlement::{AccessMode, EntitlementSnapshot, SubscriptionStatus, TrialQuota};
pub use grace::{grace_remaining, OFFLINE_GRACE_SECS};
pub use ids::{ConsumptionId, DeviceHash, Epoch, IdError};
pub use token::LicenseToken;
