//! Short-lived license tokens.

use crate::ids::Epoch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A license token issued by the service for one device.
///
/// Tokens are cheap to reissue, so validity is checked pessimistically: a
/// token is dead the moment it expires or the entitlement epoch moves past
/// the one it was minted under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseToken {
    /// The opaque token string presented to gated features.
    pub token: String,
    /// When the service minted the token.
    pub issued_at: DateTime<Utc>,
    /// Hard expiry; the token is unusable at or after this instant.
    pub expires_at: DateTime<Utc>,
    /// Entitlement epoch the token was minted under.
    pub epoch: Epoch,
}

impl LicenseToken {
    /// True when the token may still be handed to callers.
    #[must_use]
    pub fn is_valid(&self, current_epoch: Epoch, now: DateTime<Utc>) -> bool {
        self.epoch == current_epoch && now < self.expires_at
    }
}
