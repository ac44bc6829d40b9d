//! Error types for the access layer.

use atropos_api::ApiError;
use thiserror::Error;

/// Result type for access operations.
pub type AccessResult<T> = Result<T, AccessError>;

/// Errors from the access store.
///
/// Known server rejections are lifted out of [`ApiError`] into their own
/// variants because the UI treats them as terminal states, not failures.
/// `Clone` is required: coalesced callers all receive the same outcome.
#[derive(Debug, Clone, Error)]
pub enum AccessError {
    /// Transport failure or an unclassified service answer.
    #[error(transparent)]
    Api(ApiError),

    /// Reading or writing persisted access state failed.
    #[error("access state storage error: {0}")]
    Storage(String),

    /// The device has no subscription and no trial runs left.
    #[error("device is not entitled")]
    NotEntitled,

    /// The entitlement is bound to a different device.
    #[error("entitlement is bound to another device")]
    DeviceConflict,

    /// A trial run is already journaled; finalize it first.
    #[error("a trial run is already pending")]
    PendingConsumptionExists,

    /// Finalize was called with nothing journaled.
    #[error("no trial run is pending")]
    NoPendingConsumption,
}

impl AccessError {
    /// True for transport-level failures that trigger the offline
    /// grace-period fallback.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        matches!(self, AccessError::Api(api) if api.is_offline())
    }
}

impl From<ApiError> for AccessError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotEntitled => AccessError::NotEntitled,
            ApiError::DeviceConflict => AccessError::DeviceConflict,
            other => AccessError::Api(other),
        }
    }
}
