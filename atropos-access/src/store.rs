//! The access store.
//!
//! Owns the in-memory entitlement snapshot, the cached license token, and
//! the offline bookkeeping, and is the only thing that talks to the
//! licensing service. All I/O is asynchronous and uncancellable; concurrent
//! callers of the two network-bound operations are coalesced onto a single
//! in-flight request via memoized shared futures, so a store instance never
//! has more than one entitlement refresh and one token issuance on the wire
//! at a time.

use crate::config::AccessConfig;
use crate::device::{resolve_identity, AccessIdentity};
use crate::error::{AccessError, AccessResult};
use crate::storage::{AccessStateStore, CachedEntitlement, PendingConsumption, PendingStage};
use atropos_api::BillingClient;
use atropos_types::{
    grace_remaining, AccessMode, ConsumptionId, EntitlementSnapshot, Epoch, LicenseToken,
};
use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Connectivity as last observed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// The last service call succeeded.
    Online,
    /// The service is unreachable. Previously verified access stays usable
    /// until the grace window runs out.
    Offline {
        /// Time left in the offline grace window.
        grace_remaining: Duration,
    },
}

/// Derived access state handed to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessState {
    /// What the device may do right now.
    pub mode: AccessMode,
    /// Whether the verdict is live or riding the grace window.
    pub connectivity: Connectivity,
}

/// Mutable store state behind one lock.
#[derive(Debug, Default)]
struct StoreState {
    snapshot: Option<EntitlementSnapshot>,
    token: Option<LicenseToken>,
    last_verified_at: Option<DateTime<Utc>>,
    offline: bool,
}

type InFlight<T> = Shared<BoxFuture<'static, Result<T, AccessError>>>;

struct StoreInner {
    config: AccessConfig,
    identity: AccessIdentity,
    client: BillingClient,
    disk: AccessStateStore,
    state: RwLock<StoreState>,
    refresh_inflight: Mutex<Option<InFlight<EntitlementSnapshot>>>,
    issue_inflight: Mutex<Option<InFlight<LicenseToken>>>,
}

impl StoreInner {
    fn snapshot_ttl(&self) -> Duration {
        Duration::from_std(self.config.snapshot_ttl).unwrap_or(Duration::MAX)
    }

    fn derive(state: &StoreState, now: DateTime<Utc>) -> AccessState {
        let mode_from_snapshot = state
            .snapshot
            .as_ref()
            .map_or(AccessMode::Gated, EntitlementSnapshot::access_mode);

        if !state.offline {
            return AccessState {
                mode: mode_from_snapshot,
                connectivity: Connectivity::Online,
            };
        }

        let remaining = state
            .last_verified_at
            .map(|at| grace_remaining(at, now))
            .unwrap_or_else(Duration::zero);
        let mode = if remaining > Duration::zero() {
            mode_from_snapshot
        } else {
            AccessMode::Gated
        };
        AccessState {
            mode,
            connectivity: Connectivity::Offline {
                grace_remaining: remaining,
            },
        }
    }

    /// Replaces the snapshot wholesale, persists it, and drops a cached
    /// token the new epoch no longer covers.
    async fn adopt_snapshot(
        &self,
        snapshot: EntitlementSnapshot,
        verified_at: DateTime<Utc>,
    ) -> AccessResult<()> {
        {
            let mut state = self.state.write().await;
            if let Some(token) = &state.token {
                if !token.is_valid(snapshot.epoch, verified_at) {
                    debug!(token_epoch = %token.epoch, epoch = %snapshot.epoch, "dropping stale license token");
                    state.token = None;
                }
            }
            state.snapshot = Some(snapshot.clone());
            state.last_verified_at = Some(verified_at);
            state.offline = false;
        }
        self.disk.save_entitlement(&CachedEntitlement {
            snapshot,
            last_verified_at: verified_at,
        })
    }

    /// One network refresh. Callers go through [`StoreInner::shared_refresh`].
    async fn do_refresh(inner: Arc<StoreInner>) -> Result<EntitlementSnapshot, AccessError> {
        let body = inner
            .client
            .fetch_subscription(&inner.identity.device_hash)
            .await?;
        let now = Utc::now();
        let snapshot = match body {
            Some(body) => body.into_snapshot(now),
            None => {
                debug!("service has no record of this device");
                EntitlementSnapshot::none(now)
            }
        };
        inner.adopt_snapshot(snapshot.clone(), now).await?;
        Ok(snapshot)
    }

    /// Coalesces concurrent refresh calls onto one in-flight request.
    async fn shared_refresh(inner: &Arc<StoreInner>) -> Result<EntitlementSnapshot, AccessError> {
        let (fut, created) = {
            let mut slot = inner.refresh_inflight.lock().await;
            match slot.as_ref() {
                Some(fut) => (fut.clone(), false),
                None => {
                    let fut = StoreInner::do_refresh(Arc::clone(inner)).boxed().shared();
                    *slot = Some(fut.clone());
                    (fut, true)
                }
            }
        };
        let outcome = fut.await;
        if created {
            inner.refresh_inflight.lock().await.take();
        }
        outcome
    }

    /// One token issuance. Callers go through [`StoreInner::shared_issue`].
    async fn do_issue(inner: Arc<StoreInner>) -> Result<LicenseToken, AccessError> {
        let now = Utc::now();
        let ttl = inner.snapshot_ttl();
        let current = {
            let state = inner.state.read().await;
            if state.offline {
                None
            } else {
                state.snapshot.clone().filter(|s| s.is_fresh(now, ttl))
            }
        };
        let snapshot = match current {
            Some(snapshot) => snapshot,
            None => StoreInner::shared_refresh(&inner).await?,
        };
        if !snapshot.is_entitled() {
            return Err(AccessError::NotEntitled);
        }

        let response = inner
            .client
            .issue_token(&inner.identity.device_hash)
            .await?;
        let token = response.into_token();
        info!(epoch = %token.epoch, "license token issued");
        let mut state = inner.state.write().await;
        state.token = Some(token.clone());
        Ok(token)
    }

    /// Coalesces concurrent issuance calls onto one in-flight request.
    async fn shared_issue(inner: &Arc<StoreInner>) -> Result<LicenseToken, AccessError> {
        let (fut, created) = {
            let mut slot = inner.issue_inflight.lock().await;
            match slot.as_ref() {
                Some(fut) => (fut.clone(), false),
                None => {
                    let fut = StoreInner::do_issue(Arc::clone(inner)).boxed().shared();
                    *slot = Some(fut.clone());
                    (fut, true)
                }
            }
        };
        let outcome = fut.await;
        if created {
            inner.issue_inflight.lock().await.take();
        }
        outcome
    }
}

/// The access state synchronizer.
///
/// Cheap to clone; clones share the same snapshots, token cache, journal,
/// and in-flight requests.
#[derive(Clone)]
pub struct AccessStore {
    inner: Arc<StoreInner>,
}

impl AccessStore {
    /// Opens a store: resolves the device identity and loads cached state
    /// from disk so an offline launch still knows where the grace window
    /// stands.
    pub fn open(config: AccessConfig) -> AccessResult<Self> {
        let disk = match &config.data_dir {
            Some(dir) => AccessStateStore::new(dir.clone()),
            None => AccessStateStore::open_default()?,
        };
        let identity = resolve_identity(&disk)?;
        let (snapshot, last_verified_at) = match disk.load_entitlement()? {
            Some(cached) => (Some(cached.snapshot), Some(cached.last_verified_at)),
            None => (None, None),
        };
        let client = BillingClient::new(config.api_base_url.clone(), config.http_timeout);
        info!(device = %identity.device_hash, "access store opened");

        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                identity,
                client,
                disk,
                state: RwLock::new(StoreState {
                    snapshot,
                    token: None,
                    last_verified_at,
                    offline: false,
                }),
                refresh_inflight: Mutex::new(None),
                issue_inflight: Mutex::new(None),
            }),
        })
    }

    /// Returns the resolved device identity.
    #[must_use]
    pub fn identity(&self) -> &AccessIdentity {
        &self.inner.identity
    }

    /// Current derived state, without touching the network.
    pub async fn access_state(&self) -> AccessState {
        let state = self.inner.state.read().await;
        StoreInner::derive(&state, Utc::now())
    }

    /// Synchronizes the entitlement with the service.
    ///
    /// Unforced calls are satisfied from a fresh snapshot without network.
    /// On success the snapshot is replaced wholesale, the verification time
    /// persisted, and a license token issued eagerly when the device is
    /// entitled and the cache no longer covers the new epoch. A transport
    /// failure flips the store offline and the returned state carries the
    /// remaining grace window instead of an error.
    pub async fn refresh(&self, force: bool) -> AccessResult<AccessState> {
        let now = Utc::now();
        if !force {
            let state = self.inner.state.read().await;
            let fresh = !state.offline
                && state
                    .snapshot
                    .as_ref()
                    .is_some_and(|s| s.is_fresh(now, self.inner.snapshot_ttl()));
            if fresh {
                return Ok(StoreInner::derive(&state, now));
            }
        }

        match StoreInner::shared_refresh(&self.inner).await {
            Ok(snapshot) => {
                if snapshot.is_entitled() && !self.has_valid_token(snapshot.epoch).await {
                    if let Err(err) = self.ensure_license_token().await {
                        warn!(error = %err, "license issuance after refresh failed");
                    }
                }
                Ok(self.access_state().await)
            }
            Err(err) => self.absorb_refresh_failure(err).await,
        }
    }

    async fn has_valid_token(&self, epoch: Epoch) -> bool {
        let state = self.inner.state.read().await;
        state
            .token
            .as_ref()
            .is_some_and(|t| t.is_valid(epoch, Utc::now()))
    }

    /// Maps a failed refresh onto the three failure buckets.
    async fn absorb_refresh_failure(&self, err: AccessError) -> AccessResult<AccessState> {
        if err.is_offline() {
            let mut state = self.inner.state.write().await;
            state.offline = true;
            let derived = StoreInner::derive(&state, Utc::now());
            warn!(error = %err, "service unreachable, falling back to offline grace");
            return Ok(derived);
        }
        match err {
            AccessError::NotEntitled => {
                // The service answered: this device has nothing. That is a
                // state to render, not an error to surface.
                let mut state = self.inner.state.write().await;
                state.snapshot = Some(EntitlementSnapshot::none(Utc::now()));
                state.token = None;
                state.offline = false;
                Ok(StoreInner::derive(&state, Utc::now()))
            }
            err => {
                let mut state = self.inner.state.write().await;
                state.token = None;
                drop(state);
                Err(err)
            }
        }
    }

    /// Returns a valid license token, issuing one if needed.
    ///
    /// A cached token is returned only while its epoch matches the current
    /// entitlement epoch and it has not expired. Otherwise the store
    /// refreshes the snapshot as needed and requests a new token; concurrent
    /// callers share one in-flight issuance.
    pub async fn ensure_license_token(&self) -> AccessResult<LicenseToken> {
        let now = Utc::now();
        {
            let state = self.inner.state.read().await;
            if let (Some(snapshot), Some(token)) = (&state.snapshot, &state.token) {
                if token.is_valid(snapshot.epoch, now) {
                    return Ok(token.clone());
                }
            }
        }

        match StoreInner::shared_issue(&self.inner).await {
            Ok(token) => Ok(token),
            Err(err) => {
                if !err.is_offline() {
                    let mut state = self.inner.state.write().await;
                    state.token = None;
                }
                Err(err)
            }
        }
    }

    /// Journals a trial run before it starts.
    ///
    /// The record is durable before this returns; whatever happens to the
    /// process afterwards, [`AccessStore::recover_pending`] finds it. At
    /// most one record may be pending at a time.
    pub async fn mark_trial_run_pending(&self) -> AccessResult<ConsumptionId> {
        if self.inner.disk.load_pending()?.is_some() {
            return Err(AccessError::PendingConsumptionExists);
        }
        let record = PendingConsumption {
            id: ConsumptionId::new(),
            device_hash: self.inner.identity.device_hash.clone(),
            stage: PendingStage::InProgress,
            marked_at: Utc::now(),
        };
        self.inner.disk.save_pending(&record)?;
        info!(id = %record.id, "trial run journaled");
        Ok(record.id)
    }

    /// Settles the journaled trial run.
    ///
    /// When the run succeeded, the journal advances to `Finalizing` durably
    /// before the consume call goes out, and is cleared only once the
    /// server has answered. A run that never delivered just clears the
    /// journal; nothing is debited.
    pub async fn finalize_trial_run(&self, succeeded: bool) -> AccessResult<AccessState> {
        let mut record = self
            .inner
            .disk
            .load_pending()?
            .ok_or(AccessError::NoPendingConsumption)?;

        if !succeeded {
            self.inner.disk.clear_pending()?;
            debug!(id = %record.id, "trial run abandoned, nothing to debit");
            return Ok(self.access_state().await);
        }

        record.stage = PendingStage::Finalizing;
        self.inner.disk.save_pending(&record)?;
        self.commit_consumption(record).await
    }

    /// Re-attempts a consumption left dangling by a crash.
    ///
    /// Call once at startup. The journaled id makes the retry idempotent:
    /// however many launches it takes to reach the server, the run is
    /// debited at most once. A server answer settles the record whether it
    /// is success or rejection; only transport failures keep it for the
    /// next launch.
    pub async fn recover_pending(&self) -> AccessResult<Option<AccessState>> {
        let Some(mut record) = self.inner.disk.load_pending()? else {
            return Ok(None);
        };
        info!(id = %record.id, stage = ?record.stage, "recovering dangling trial consumption");
        if record.stage == PendingStage::InProgress {
            // The run was dispensed even if we never saw it finish; commit
            // to consuming it rather than handing out a free run.
            record.stage = PendingStage::Finalizing;
            self.inner.disk.save_pending(&record)?;
        }
        self.commit_consumption(record).await.map(Some)
    }

    async fn commit_consumption(&self, record: PendingConsumption) -> AccessResult<AccessState> {
        match self
            .inner
            .client
            .consume_trial_run(&record.device_hash, record.id)
            .await
        {
            Ok(body) => {
                let now = Utc::now();
                self.inner.adopt_snapshot(body.into_snapshot(now), now).await?;
                self.inner.disk.clear_pending()?;
                info!(id = %record.id, "trial consumption confirmed");
                Ok(self.access_state().await)
            }
            Err(err) if err.is_offline() => {
                {
                    let mut state = self.inner.state.write().await;
                    state.offline = true;
                }
                warn!(id = %record.id, "consume call unreachable, journal kept for next launch");
                Err(err.into())
            }
            Err(err) => {
                // The server answered; the attempt is settled either way.
                self.inner.disk.clear_pending()?;
                let err: AccessError = err.into();
                if matches!(err, AccessError::DeviceConflict) {
                    let mut state = self.inner.state.write().await;
                    state.token = None;
                }
                warn!(id = %record.id, error = %err, "consume call rejected, journal cleared");
                Err(err)
            }
        }
    }

    /// Starts the trial for this device and adopts the returned
    /// entitlement.
    pub async fn start_trial(&self) -> AccessResult<AccessState> {
        let body = self
            .inner
            .client
            .start_trial(&self.inner.identity.device_hash)
            .await?;
        let now = Utc::now();
        self.inner.adopt_snapshot(body.into_snapshot(now), now).await?;
        if let Err(err) = self.ensure_license_token().await {
            warn!(error = %err, "license issuance after trial start failed");
        }
        Ok(self.access_state().await)
    }

    /// Creates a checkout session; returns the URL to open in a browser.
    pub async fn checkout_url(&self) -> AccessResult<String> {
        let session = self
            .inner
            .client
            .create_checkout_session(&self.inner.identity.device_hash)
            .await?;
        Ok(session.url)
    }

    /// Creates a billing portal session; returns the URL to open.
    pub async fn billing_portal_url(&self) -> AccessResult<String> {
        let session = self
            .inner
            .client
            .create_portal_session(&self.inner.identity.device_hash)
            .await?;
        Ok(session.url)
    }

    /// Spawns the periodic background refresh.
    ///
    /// The first refresh fires immediately; afterwards one fires per
    /// configured interval. Failures are logged and the next tick tries
    /// again. The task runs until the returned handle is aborted.
    pub fn spawn_refresh_task(&self) -> JoinHandle<()> {
        let store = self.clone();
        let period = store.inner.config.refresh_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(err) = store.refresh(false).await {
                    warn!(error = %err, "background refresh failed");
                }
            }
        })
    }
}
