use atropos_types::{grace_remaining, OFFLINE_GRACE_SECS};
use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

fn verified_at() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn full_window_immediately_after_verification() {
    let at = verified_at();
    assert_eq!(
        grace_remaining(at, at),
        Duration::seconds(OFFLINE_GRACE_SECS)
    );
}

#[test]
fn zero_exactly_at_twenty_four_hours() {
    let at = verified_at();
    let deadline = at + Duration::seconds(OFFLINE_GRACE_SECS);
    assert_eq!(grace_remaining(at, deadline), Duration::zero());
    assert_eq!(
        grace_remaining(at, deadline - Duration::seconds(1)),
        Duration::seconds(1)
    );
}

#[test]
fn never_negative_long_after_expiry() {
    let at = verified_at();
    let much_later = at + Duration::days(30);
    assert_eq!(grace_remaining(at, much_later), Duration::zero());
}

#[test]
fn clock_rollback_cannot_stretch_the_window() {
    let at = verified_at();
    let before = at - Duration::hours(5);
    assert_eq!(
        grace_remaining(at, before),
        Duration::seconds(OFFLINE_GRACE_SECS)
    );
}

proptest! {
    #[test]
    fn remaining_is_bounded(offset_secs in -100_000i64..300_000i64) {
        let at = verified_at();
        let now = at + Duration::seconds(offset_secs);
        let remaining = grace_remaining(at, now);
        prop_assert!(remaining >= Duration::zero());
        prop_assert!(remaining <= Duration::seconds(OFFLINE_GRACE_SECS));
    }

    #[test]
    fn remaining_never_increases_with_time(a in 0i64..200_000, b in 0i64..200_000) {
        let (earlier, later) = if a <= b { (a, b) } else { (b, a) };
        let at = verified_at();
        let r_earlier = grace_remaining(at, at + Duration::seconds(earlier));
        let r_later = grace_remaining(at, at + Duration::seconds(later));
        prop_assert!(r_later <= r_earlier);
    }
}
