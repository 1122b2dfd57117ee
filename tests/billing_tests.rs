//! Expiry calculator and classification properties.

use chrono::{Duration, NaiveDate};
use despacho::billing::{
    classify, extend, extend_with_kind, grant_courtesy, next_due_date, BillingPolicy,
    ExtensionKind, SubscriptionStatus,
};

const CYCLE: i64 = 30;
const GRACE: i64 = 60;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A spread of "today" values crossing month, year and leap-day boundaries.
fn sample_days() -> Vec<NaiveDate> {
    vec![
        date(2024, 1, 15),
        date(2024, 2, 29),
        date(2024, 3, 1),
        date(2023, 12, 31),
        date(2025, 6, 30),
    ]
}

#[test]
fn never_billed_starts_today() {
    for today in sample_days() {
        assert_eq!(extend(None, today, CYCLE, GRACE), today + Duration::days(30));
    }
}

#[test]
fn within_grace_preserves_anchor() {
    for today in sample_days() {
        for offset in [-60, -59, -5, 0, 1, 30, 200] {
            let current = today + Duration::days(offset);
            assert_eq!(
                extend(Some(current), today, CYCLE, GRACE),
                current + Duration::days(30),
                "today={today} current={current}"
            );
        }
    }
}

#[test]
fn beyond_grace_discards_backlog() {
    for today in sample_days() {
        for offset in [-61, -90, -400] {
            let current = today + Duration::days(offset);
            assert_eq!(
                extend(Some(current), today, CYCLE, GRACE),
                today + Duration::days(30),
                "today={today} current={current}"
            );
        }
    }
}

#[test]
fn extending_twice_adds_two_cycles() {
    let today = date(2024, 1, 15);
    let once = extend(Some(date(2024, 1, 10)), today, CYCLE, GRACE);
    let twice = extend(Some(once), today, CYCLE, GRACE);

    assert_ne!(once, twice);
    assert_eq!(once, date(2024, 2, 9));
    assert_eq!(twice, date(2024, 3, 10));
}

#[test]
fn late_payment_inside_grace_keeps_due_day() {
    let extension = extend_with_kind(Some(date(2024, 1, 10)), date(2024, 1, 15), CYCLE, GRACE);
    assert_eq!(extension.new_expiry, date(2024, 2, 9));
    assert_eq!(extension.kind, ExtensionKind::AnchorPreserved);
}

#[test]
fn long_lapse_reactivates_from_today() {
    let extension = extend_with_kind(Some(date(2023, 10, 1)), date(2024, 1, 15), CYCLE, GRACE);
    assert_eq!(extension.new_expiry, date(2024, 2, 14));
    assert_eq!(extension.kind, ExtensionKind::Reactivated);
    assert_ne!(extension.new_expiry, date(2023, 10, 31));
}

#[test]
fn grace_boundary_is_inclusive() {
    let today = date(2024, 1, 15);
    let edge = today - Duration::days(60);

    assert_eq!(
        extend_with_kind(Some(edge), today, CYCLE, GRACE).kind,
        ExtensionKind::AnchorPreserved
    );
    assert_eq!(
        extend_with_kind(Some(edge - Duration::days(1)), today, CYCLE, GRACE).kind,
        ExtensionKind::Reactivated
    );
}

#[test]
fn policy_uses_configured_lengths() {
    let policy = BillingPolicy {
        cycle_days: 31,
        grace_days: 10,
        expiring_soon_days: 5,
    };
    let today = date(2024, 1, 15);

    assert_eq!(policy.extend(None, today).new_expiry, date(2024, 2, 15));
    assert_eq!(
        policy.extend(Some(date(2024, 1, 1)), today).kind,
        ExtensionKind::Reactivated
    );
}

#[test]
fn classification_boundaries() {
    let today = date(2024, 1, 15);

    let unlimited = classify(None, today, 5);
    assert_eq!(unlimited.status, SubscriptionStatus::Unlimited);
    assert_eq!(unlimited.days_remaining, None);

    let yesterday = classify(Some(today - Duration::days(1)), today, 5);
    assert_eq!(yesterday.status, SubscriptionStatus::Expired);
    assert_eq!(yesterday.days_remaining, Some(-1));
    assert_eq!(yesterday.days_overdue(), 1);

    assert_eq!(
        classify(Some(today), today, 5).status,
        SubscriptionStatus::ExpiringSoon
    );
    assert_eq!(
        classify(Some(today + Duration::days(5)), today, 5).status,
        SubscriptionStatus::ExpiringSoon
    );
    assert_eq!(
        classify(Some(today + Duration::days(6)), today, 5).status,
        SubscriptionStatus::Healthy
    );
}

#[test]
fn courtesy_has_no_grace_window() {
    let today = date(2024, 1, 15);

    assert_eq!(grant_courtesy(None, today, 7), date(2024, 1, 22));
    assert_eq!(grant_courtesy(Some(date(2024, 1, 20)), today, 7), date(2024, 1, 27));
    assert_eq!(grant_courtesy(Some(today), today, 7), date(2024, 1, 22));
    // One day lapsed already restarts from today
    assert_eq!(grant_courtesy(Some(date(2024, 1, 14)), today, 7), date(2024, 1, 22));
}

#[test]
fn due_date_is_separate_from_expiry() {
    let today = date(2024, 1, 15);

    assert_eq!(next_due_date(today, 20), date(2024, 1, 20));
    assert_eq!(next_due_date(today, 15), today);
    assert_eq!(next_due_date(today, 10), date(2024, 2, 10));
    assert_eq!(next_due_date(date(2024, 12, 20), 5), date(2025, 1, 5));
    assert_ne!(next_due_date(today, 10), extend(None, today, CYCLE, GRACE));
}

#[test]
fn due_date_clamps_short_months() {
    assert_eq!(next_due_date(date(2024, 4, 1), 31), date(2024, 4, 30));
    assert_eq!(next_due_date(date(2024, 2, 1), 31), date(2024, 2, 29));
    assert_eq!(next_due_date(date(2023, 2, 1), 30), date(2023, 2, 28));
}
