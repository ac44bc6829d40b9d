//! Offline grace-period arithmetic.
//!
//! When the licensing service is unreachable, previously verified access
//! stays usable for a bounded window counted from the last successful
//! verification. The countdown itself is pure; the store supplies the
//! persisted `last_verified_at` and the current time.

use chrono::{DateTime, Duration, Utc};

/// Offline grace window in seconds (24 hours).
pub const OFFLINE_GRACE_SECS: i64 = 24 * 60 * 60;

/// Time left in the offline grace window at `now`.
///
/// Clamped to `[0, OFFLINE_GRACE_SECS]`: the result never goes negative and
/// a clock stepped backwards cannot stretch the window. Reaches zero exactly
/// `OFFLINE_GRACE_SECS` after `last_verified_at`.
#[must_use]
pub fn grace_remaining(last_verified_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let window = Duration::seconds(OFFLINE_GRACE_SECS);
    let deadline = last_verified_at + window;
    let remaining = deadline.signed_duration_since(now);
    remaining.clamp(Duration::zero(), window)
}
