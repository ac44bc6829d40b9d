//! Error taxonomy for the licensing service client.

use thiserror::Error;

/// Result type for service calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors from the licensing/billing service.
///
/// Variants carry strings and status codes rather than live transport
/// errors so results stay `Clone`: the access store memoizes in-flight
/// calls and hands the same outcome to every coalesced caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Transport-level failure: the service could not be reached at all.
    #[error("licensing service unreachable: {0}")]
    Offline(String),

    /// The service knows this device and refuses to entitle it (403/404).
    #[error("device is not entitled")]
    NotEntitled,

    /// The entitlement is bound to a different device (409).
    #[error("entitlement is bound to another device")]
    DeviceConflict,

    /// Any other non-success answer from the service.
    #[error("service rejected request: {code} {message}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body, as far as it could be read.
        message: String,
    },

    /// The service answered 2xx but the body did not parse.
    #[error("malformed service response: {0}")]
    Decode(String),
}

impl ApiError {
    /// True for transport failures that should trigger the offline
    /// grace-period fallback rather than a terminal UI state.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        matches!(self, ApiError::Offline(_))
    }

    /// Classifies a non-success HTTP status into a terminal error.
    #[must_use]
    pub fn from_status(code: u16, message: String) -> Self {
        match code {
            403 | 404 => ApiError::NotEntitled,
            409 => ApiError::DeviceConflict,
            _ => ApiError::Status { code, message },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            // Connect failures, timeouts, dropped connections: the service
            // is unreachable from where we sit.
            ApiError::Offline(err.to_string())
        }
    }
}
