//! Identifier types used throughout the Atropos access layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Number of lowercase hex characters in a device hash.
const DEVICE_HASH_LEN: usize = 32;

/// Errors from parsing identifier strings.
#[derive(Debug, Error)]
pub enum IdError {
    /// Device hash string has the wrong shape.
    #[error("device hash must be {DEVICE_HASH_LEN} lowercase hex characters, got {0:?}")]
    InvalidDeviceHash(String),

    /// Consumption id is not a valid UUID.
    #[error("invalid consumption id: {0}")]
    InvalidConsumptionId(#[from] uuid::Error),
}

/// Stable opaque identifier for a device.
///
/// The value is derived once per device (hardware fingerprint hash, or a
/// persisted random UUID when no hardware identity is available) and never
/// changes afterwards. The access layer treats it as an opaque lowercase hex
/// string; derivation lives with the fingerprint code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceHash(String);

impl DeviceHash {
    /// Wraps a pre-derived hash string, validating its shape.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        let ok = value.len() == DEVICE_HASH_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase());
        if ok {
            Ok(Self(value))
        } else {
            Err(IdError::InvalidDeviceHash(value))
        }
    }

    /// Returns the hash as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceHash {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Monotonic counter that invalidates previously issued license tokens
/// whenever the subscription state changes server-side.
///
/// A token minted under epoch N is dead the moment the entitlement reports
/// epoch M > N.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Epoch(u64);

impl Epoch {
    /// Epoch of a device with no entitlement history.
    pub const ZERO: Epoch = Epoch(0);

    /// Creates an epoch from a raw counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one trial-consumption attempt.
///
/// Written to the local journal before the consume call and sent to the
/// server with it, so a crashed-and-recovered attempt is idempotent: the
/// server debits a given id at most once. Uses UUID v7 so ids order by time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumptionId(Uuid);

impl ConsumptionId {
    /// Creates a new consumption id with the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a consumption id from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConsumptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConsumptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConsumptionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
