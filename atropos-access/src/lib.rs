//! Access state synchronization for Atropos.
//!
//! This crate reconciles a device's entitlement against the licensing
//! service and derives the access state the desktop shell renders:
//! - Stable per-device identity (hardware fingerprint hash, with a
//!   persisted random fallback)
//! - Entitlement snapshots, replaced wholesale on each successful fetch
//! - Short-lived license tokens, invalidated on epoch change or expiry
//! - A bounded offline grace window counted from the last successful
//!   verification
//! - Two-phase trial-run consumption with a durable local journal, so a
//!   crash between "run used" and "server acknowledged" neither loses nor
//!   double-spends a run
//!
//! # Design Principles
//!
//! - **One store, injected**: the store is constructed from an explicit
//!   [`AccessConfig`] and passed where needed; there is no global singleton
//!   and no environment-variable resolution.
//! - **Coalesced I/O**: concurrent callers of [`AccessStore::refresh`] or
//!   [`AccessStore::ensure_license_token`] share one in-flight request.
//! - **Server is the source of truth**: the client never edits counters or
//!   entitlement fields locally; it only replaces snapshots the service
//!   returned.

mod config;
mod device;
mod error;
mod storage;
mod store;

pub use config::AccessConfig;
pub use device::{resolve_identity, AccessIdentity};
pub use error::{AccessError, AccessResult};
pub use storage::{AccessStateStore, CachedEntitlement, PendingConsumption, PendingStage};
pub use store::{AccessState, AccessStore, Connectivity};
