//! Device identity resolution.
//!
//! Each installation gets one stable [`DeviceHash`], derived from hardware
//! identifiers where the platform exposes them. When it doesn't, a random
//! component stands in; either way the result is persisted and reused, so
//! the hash never changes for the lifetime of the installation.

use crate::error::AccessResult;
use crate::storage::AccessStateStore;
use atropos_types::DeviceHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use tracing::info;
use uuid::Uuid;

/// The resolved identity of this device.
///
/// Immutable once derived; cached in memory and on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessIdentity {
    /// Stable device hash sent with every service call.
    pub device_hash: DeviceHash,
    /// When the identity was first derived.
    pub resolved_at: DateTime<Utc>,
}

/// Returns the persisted identity, deriving and persisting one on first run.
pub fn resolve_identity(store: &AccessStateStore) -> AccessResult<AccessIdentity> {
    if let Some(identity) = store.load_identity()? {
        return Ok(identity);
    }
    let identity = derive_identity();
    store.save_identity(&identity)?;
    info!(device = %identity.device_hash, "derived new device identity");
    Ok(identity)
}

fn derive_identity() -> AccessIdentity {
    let mut components = vec![
        env::consts::OS.to_string(),
        env::consts::ARCH.to_string(),
        local_hostname(),
    ];

    match platform_machine_id() {
        Some(machine_id) => components.push(machine_id),
        // No stable hardware identifier on this platform. A random
        // component keeps distinct installations distinct; persistence
        // keeps the resulting hash stable.
        None => components.push(Uuid::new_v4().to_string()),
    }

    if let Ok(user) = env::var("USER").or_else(|_| env::var("USERNAME")) {
        components.push(user);
    }

    AccessIdentity {
        device_hash: hash_components(&components),
        resolved_at: Utc::now(),
    }
}

/// Hashes identity components into a device hash.
///
/// Components are length-delimited before hashing so `["ab", "c"]` and
/// `["a", "bc"]` cannot collide.
fn hash_components(components: &[String]) -> DeviceHash {
    let mut hasher = Sha256::new();
    for component in components {
        hasher.update((component.len() as u64).to_le_bytes());
        hasher.update(component.as_bytes());
    }
    let digest = hasher.finalize();
    DeviceHash::new(hex::encode(&digest[..16])).expect("sha256 hex is a valid device hash")
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Platform-specific stable machine identifier.
fn platform_machine_id() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    #[cfg(target_os = "macos")]
    {
        let output = std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()?;
        String::from_utf8(output.stdout)
            .ok()?
            .lines()
            .find(|line| line.contains("IOPlatformUUID"))
            .and_then(|line| line.split('"').nth(3))
            .map(String::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}
