//! Persisted access state.
//!
//! Three small JSON files under one data directory:
//! - `identity.json` — the resolved device identity
//! - `entitlement.json` — last fetched snapshot plus its verification time,
//!   read at startup so an offline launch can honor the grace window
//! - `pending_consumption.json` — the two-phase trial journal; present only
//!   while a consumption is in flight
//!
//! Every write lands in a temp file first and is renamed into place, so a
//! crash mid-write cannot leave a torn journal behind.

use crate::device::AccessIdentity;
use crate::error::{AccessError, AccessResult};
use atropos_types::{ConsumptionId, DeviceHash, EntitlementSnapshot};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

const IDENTITY_FILE: &str = "identity.json";
const ENTITLEMENT_FILE: &str = "entitlement.json";
const PENDING_FILE: &str = "pending_consumption.json";

/// The last fetched snapshot and when the service last verified us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntitlement {
    /// Snapshot as of the last successful fetch.
    pub snapshot: EntitlementSnapshot,
    /// Start of the offline grace window.
    pub last_verified_at: DateTime<Utc>,
}

/// Stage of a journaled trial consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStage {
    /// The run was dispensed; the consume call has not been attempted yet.
    InProgress,
    /// The consume call was committed to; it must be (re-)sent until the
    /// server answers.
    Finalizing,
}

/// Durable record of one trial-run consumption attempt.
///
/// Written before the run starts, cleared only after the server answers, so
/// a crash in between is recovered on the next launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConsumption {
    /// Idempotency key sent with the consume call.
    pub id: ConsumptionId,
    /// Device the run belongs to.
    pub device_hash: DeviceHash,
    /// Where the two-phase commit stopped.
    pub stage: PendingStage,
    /// When the run was journaled.
    pub marked_at: DateTime<Utc>,
}

/// File-backed store for access state.
#[derive(Debug, Clone)]
pub struct AccessStateStore {
    root: PathBuf,
}

impl AccessStateStore {
    /// Creates a store rooted at `root`. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Creates a store under the platform data directory.
    pub fn open_default() -> AccessResult<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| AccessError::Storage("no platform data directory".to_string()))?;
        Ok(Self::new(base.join("atropos")))
    }

    /// Returns the directory this store writes under.
    #[must_use]
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Loads the persisted device identity, if one was saved.
    pub fn load_identity(&self) -> AccessResult<Option<AccessIdentity>> {
        self.read_json(IDENTITY_FILE)
    }

    /// Persists the device identity.
    pub fn save_identity(&self, identity: &AccessIdentity) -> AccessResult<()> {
        self.write_json(IDENTITY_FILE, identity)
    }

    /// Loads the cached entitlement, if one was saved.
    pub fn load_entitlement(&self) -> AccessResult<Option<CachedEntitlement>> {
        self.read_json(ENTITLEMENT_FILE)
    }

    /// Persists the cached entitlement.
    pub fn save_entitlement(&self, cached: &CachedEntitlement) -> AccessResult<()> {
        self.write_json(ENTITLEMENT_FILE, cached)
    }

    /// Loads the pending consumption journal.
    ///
    /// A journal that exists but cannot be read degrades to `None` with a
    /// warning — an unreadable journal must not keep the app from starting,
    /// and the idempotency key it held is lost either way.
    pub fn load_pending(&self) -> AccessResult<Option<PendingConsumption>> {
        match self.read_json(PENDING_FILE) {
            Ok(record) => Ok(record),
            Err(err) => {
                warn!(error = %err, "dropping unreadable consumption journal");
                let _ = fs::remove_file(self.root.join(PENDING_FILE));
                Ok(None)
            }
        }
    }

    /// Journals a pending consumption.
    pub fn save_pending(&self, record: &PendingConsumption) -> AccessResult<()> {
        self.write_json(PENDING_FILE, record)
    }

    /// Clears the consumption journal.
    pub fn clear_pending(&self) -> AccessResult<()> {
        match fs::remove_file(self.root.join(PENDING_FILE)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AccessError::Storage(err.to_string())),
        }
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> AccessResult<Option<T>> {
        let path = self.root.join(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AccessError::Storage(err.to_string())),
        };
        let value = serde_json::from_slice(&bytes)
            .map_err(|err| AccessError::Storage(format!("{name}: {err}")))?;
        Ok(Some(value))
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> AccessResult<()> {
        fs::create_dir_all(&self.root).map_err(|err| AccessError::Storage(err.to_string()))?;
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|err| AccessError::Storage(err.to_string()))?;
        let tmp = self.root.join(format!("{name}.tmp"));
        fs::write(&tmp, bytes).map_err(|err| AccessError::Storage(err.to_string()))?;
        fs::rename(&tmp, self.root.join(name))
            .map_err(|err| AccessError::Storage(err.to_string()))
    }
}
