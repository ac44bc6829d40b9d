//! Store configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for an [`crate::AccessStore`].
///
/// Everything the store needs is passed here explicitly: the base URL so
/// tests can point the store at a local mock service, the data directory so
/// tests can use a temp dir.
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Base URL of the licensing/billing service.
    pub api_base_url: String,
    /// Directory for persisted access state. `None` uses the platform data
    /// directory (`<data_dir>/atropos`).
    pub data_dir: Option<PathBuf>,
    /// Timeout for individual service calls.
    pub http_timeout: Duration,
    /// Period of the background refresh task.
    pub refresh_interval: Duration,
    /// How long a fetched snapshot satisfies an unforced refresh.
    pub snapshot_ttl: Duration,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.atropos.app".to_string(),
            data_dir: None,
            http_timeout: Duration::from_secs(10),
            refresh_interval: Duration::from_secs(15 * 60),
            snapshot_ttl: Duration::from_secs(60),
        }
    }
}
