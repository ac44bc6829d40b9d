use atropos_types::{AccessMode, EntitlementSnapshot, Epoch, SubscriptionStatus, TrialQuota};
use chrono::{Duration, Utc};

fn snapshot(status: Option<SubscriptionStatus>, trial: Option<TrialQuota>) -> EntitlementSnapshot {
    EntitlementSnapshot {
        status,
        trial,
        epoch: Epoch::new(3),
        fetched_at: Utc::now(),
    }
}

#[test]
fn active_subscription_is_paid() {
    let snap = snapshot(Some(SubscriptionStatus::Active), None);
    assert_eq!(snap.access_mode(), AccessMode::Paid);
    assert!(snap.is_entitled());
}

#[test]
fn past_due_still_paid() {
    let snap = snapshot(Some(SubscriptionStatus::PastDue), None);
    assert_eq!(snap.access_mode(), AccessMode::Paid);
}

#[test]
fn canceled_falls_back_to_trial_runs() {
    let quota = TrialQuota {
        runs_total: 5,
        runs_used: 3,
    };
    let snap = snapshot(Some(SubscriptionStatus::Canceled), Some(quota));
    assert_eq!(snap.access_mode(), AccessMode::Trial { runs_remaining: 2 });
}

#[test]
fn exhausted_trial_is_gated() {
    let quota = TrialQuota {
        runs_total: 5,
        runs_used: 5,
    };
    let snap = snapshot(None, Some(quota));
    assert_eq!(snap.access_mode(), AccessMode::Gated);
    assert!(!snap.is_entitled());
}

#[test]
fn overconsumed_trial_saturates() {
    let quota = TrialQuota {
        runs_total: 3,
        runs_used: 7,
    };
    assert_eq!(quota.runs_remaining(), 0);
}

#[test]
fn none_snapshot_is_gated_at_epoch_zero() {
    let snap = EntitlementSnapshot::none(Utc::now());
    assert_eq!(snap.access_mode(), AccessMode::Gated);
    assert_eq!(snap.epoch, Epoch::ZERO);
    assert!(snap.status.is_none());
    assert!(snap.trial.is_none());
}

#[test]
fn freshness_window() {
    let now = Utc::now();
    let mut snap = EntitlementSnapshot::none(now);
    assert!(snap.is_fresh(now, Duration::seconds(30)));

    snap.fetched_at = now - Duration::seconds(31);
    assert!(!snap.is_fresh(now, Duration::seconds(30)));
}

#[test]
fn subscription_status_wire_form() {
    let json = serde_json::to_string(&SubscriptionStatus::PastDue).unwrap();
    assert_eq!(json, r#""past_due""#);

    let parsed: SubscriptionStatus = serde_json::from_str(r#""canceled""#).unwrap();
    assert_eq!(parsed, SubscriptionStatus::Canceled);
}
