//! The entitlement snapshot and the access mode derived from it.
//!
//! A snapshot is the server's verdict on one device at one moment. It is
//! replaced wholesale on every successful fetch and never partially mutated;
//! anything the UI needs is derived from it with pure functions.

use crate::ids::Epoch;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Subscription standing as reported by the billing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid and current.
    Active,
    /// Payment failed but the subscription has not lapsed yet.
    PastDue,
    /// Cancelled; paid access has ended.
    Canceled,
}

/// Trial run counters for a device without a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialQuota {
    /// Total runs granted to this device.
    pub runs_total: u32,
    /// Runs already consumed (server-confirmed).
    pub runs_used: u32,
}

impl TrialQuota {
    /// Returns the number of trial runs still available.
    #[must_use]
    pub fn runs_remaining(&self) -> u32 {
        self.runs_total.saturating_sub(self.runs_used)
    }
}

/// The UI-facing access verdict derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// No subscription and no trial runs left.
    Gated,
    /// Trial runs remain.
    Trial {
        /// Runs the device may still consume.
        runs_remaining: u32,
    },
    /// Active (or past-due) subscription.
    Paid,
}

/// One fetched entitlement verdict for this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementSnapshot {
    /// Subscription standing, absent when the device has never subscribed.
    pub status: Option<SubscriptionStatus>,
    /// Trial counters, absent when no trial was ever started.
    pub trial: Option<TrialQuota>,
    /// Token-invalidation epoch for this device.
    pub epoch: Epoch,
    /// When this snapshot was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl EntitlementSnapshot {
    /// Snapshot for a device the server has no record of (404 answer).
    #[must_use]
    pub fn none(fetched_at: DateTime<Utc>) -> Self {
        Self {
            status: None,
            trial: None,
            epoch: Epoch::ZERO,
            fetched_at,
        }
    }

    /// Derives the access mode from this snapshot.
    ///
    /// `PastDue` still maps to `Paid`: the billing service keeps the epoch
    /// stable through the dunning window, so access continues until the
    /// subscription actually lapses to `Canceled`.
    #[must_use]
    pub fn access_mode(&self) -> AccessMode {
        match self.status {
            Some(SubscriptionStatus::Active) | Some(SubscriptionStatus::PastDue) => {
                return AccessMode::Paid;
            }
            Some(SubscriptionStatus::Canceled) | None => {}
        }
        match self.trial {
            Some(quota) if quota.runs_remaining() > 0 => AccessMode::Trial {
                runs_remaining: quota.runs_remaining(),
            },
            _ => AccessMode::Gated,
        }
    }

    /// True when the derived mode permits use (and so license issuance).
    #[must_use]
    pub fn is_entitled(&self) -> bool {
        self.access_mode() != AccessMode::Gated
    }

    /// True when the snapshot was fetched within `ttl` of `now`.
    ///
    /// Used by the store to skip a network round-trip on unforced refreshes.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.fetched_at) < ttl
    }
}
