// crates/watchgate-core/tests/quota_unit.rs
// ============================================================================
// Module: Quota Tracker Unit Tests
// Description: Window counting, reset dates, boundaries, and bypass.
// Purpose: Validate daily, weekly-rolling, and monthly quota computation.
// Dependencies: watchgate-core, time
// ============================================================================

//! Quota window tests over the in-memory ledger with explicit `now`
//! values.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::sync::Arc;

use common::user_id;
use time::Date;
use time::macros::datetime;
use watchgate_core::ContentType;
use watchgate_core::QuotaType;
use watchgate_core::QuotaUsage;
use watchgate_core::UserQuota;
use watchgate_core::interfaces::QuotaStore;
use watchgate_core::runtime::InMemoryStores;
use watchgate_core::runtime::QuotaTracker;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn tracker_with_quota(quota_type: QuotaType, limit: u32, bypass: bool) -> (Arc<InMemoryStores>, QuotaTracker) {
    let stores = Arc::new(InMemoryStores::new());
    stores.insert_quota(UserQuota {
        user_id: user_id(9),
        quota_type,
        quota_limit: limit,
        bypass_approval: bypass,
    });
    let store: Arc<dyn QuotaStore> = stores.clone();
    let tracker = QuotaTracker::new(store);
    (stores, tracker)
}

fn usage_on(stores: &InMemoryStores, date: Date) {
    stores
        .record_usage(QuotaUsage {
            user_id: user_id(9),
            content_type: ContentType::Movie,
            request_date: date,
        })
        .expect("record usage");
}

fn date(raw: &str) -> Date {
    let format = time::macros::format_description!("[year]-[month]-[day]");
    Date::parse(raw, &format).expect("date literal")
}

// ============================================================================
// SECTION: Daily Quota
// ============================================================================

#[test]
fn daily_quota_counts_only_today() {
    let (stores, tracker) = tracker_with_quota(QuotaType::Daily, 2, false);
    usage_on(&stores, date("2026-03-13"));
    usage_on(&stores, date("2026-03-14"));

    let now = datetime!(2026-03-14 18:30:00 UTC);
    let status = tracker.status(user_id(9), ContentType::Movie, now).expect("status").expect("quota");

    assert_eq!(status.current_usage, 1);
    assert!(!status.exceeded);
    assert_eq!(status.reset_date, Some(date("2026-03-15")));
}

#[test]
fn daily_quota_exceeds_at_the_limit() {
    let (stores, tracker) = tracker_with_quota(QuotaType::Daily, 2, false);
    usage_on(&stores, date("2026-03-14"));
    usage_on(&stores, date("2026-03-14"));

    let now = datetime!(2026-03-14 18:30:00 UTC);
    let status = tracker.status(user_id(9), ContentType::Movie, now).expect("status").expect("quota");

    assert_eq!(status.current_usage, 2);
    assert!(status.exceeded);
}

// ============================================================================
// SECTION: Weekly Rolling Quota
// ============================================================================

#[test]
fn weekly_rolling_window_counts_the_trailing_seven_days() {
    let (stores, tracker) = tracker_with_quota(QuotaType::WeeklyRolling, 5, false);
    usage_on(&stores, date("2026-03-07")); // outside the window
    usage_on(&stores, date("2026-03-08")); // oldest inside
    usage_on(&stores, date("2026-03-12"));
    usage_on(&stores, date("2026-03-14"));

    let now = datetime!(2026-03-14 08:00:00 UTC);
    let status = tracker.status(user_id(9), ContentType::Movie, now).expect("status").expect("quota");

    assert_eq!(status.current_usage, 3);
    // Reset is seven days after the oldest counted row.
    assert_eq!(status.reset_date, Some(date("2026-03-15")));
}

#[test]
fn weekly_rolling_with_no_usage_has_no_reset_date() {
    let (_stores, tracker) = tracker_with_quota(QuotaType::WeeklyRolling, 5, false);

    let now = datetime!(2026-03-14 08:00:00 UTC);
    let status = tracker.status(user_id(9), ContentType::Movie, now).expect("status").expect("quota");

    assert_eq!(status.current_usage, 0);
    assert_eq!(status.reset_date, None);
}

// ============================================================================
// SECTION: Monthly Quota
// ============================================================================

#[test]
fn monthly_quota_counts_the_calendar_month() {
    let (stores, tracker) = tracker_with_quota(QuotaType::Monthly, 10, false);
    usage_on(&stores, date("2026-02-27")); // previous month
    usage_on(&stores, date("2026-03-01"));
    usage_on(&stores, date("2026-03-14"));

    let now = datetime!(2026-03-14 23:59:00 UTC);
    let status = tracker.status(user_id(9), ContentType::Movie, now).expect("status").expect("quota");

    assert_eq!(status.current_usage, 2);
    assert_eq!(status.reset_date, Some(date("2026-04-01")));
}

#[test]
fn monthly_reset_rolls_over_the_year_in_december() {
    let (_stores, tracker) = tracker_with_quota(QuotaType::Monthly, 10, false);

    let now = datetime!(2026-12-20 10:00:00 UTC);
    let status = tracker.status(user_id(9), ContentType::Movie, now).expect("status").expect("quota");

    assert_eq!(status.reset_date, Some(date("2027-01-01")));
}

// ============================================================================
// SECTION: Bypass and Separation
// ============================================================================

#[test]
fn bypass_approval_reports_not_exceeded_regardless_of_usage() {
    let (stores, tracker) = tracker_with_quota(QuotaType::Daily, 1, true);
    usage_on(&stores, date("2026-03-14"));
    usage_on(&stores, date("2026-03-14"));

    let now = datetime!(2026-03-14 18:30:00 UTC);
    let status = tracker.status(user_id(9), ContentType::Movie, now).expect("status").expect("quota");

    assert_eq!(status.current_usage, 2);
    assert!(!status.exceeded);
    assert!(status.bypass_approval);
}

#[test]
fn usage_is_counted_per_content_type() {
    let (stores, tracker) = tracker_with_quota(QuotaType::Daily, 2, false);
    stores
        .record_usage(QuotaUsage {
            user_id: user_id(9),
            content_type: ContentType::Show,
            request_date: date("2026-03-14"),
        })
        .expect("record usage");

    let now = datetime!(2026-03-14 18:30:00 UTC);
    let status = tracker.status(user_id(9), ContentType::Movie, now).expect("status").expect("quota");

    assert_eq!(status.current_usage, 0);
}

#[test]
fn user_without_quota_has_no_status() {
    let stores = Arc::new(InMemoryStores::new());
    let store: Arc<dyn QuotaStore> = stores.clone();
    let tracker = QuotaTracker::new(store);

    let now = datetime!(2026-03-14 18:30:00 UTC);
    let status = tracker.status(user_id(9), ContentType::Movie, now).expect("status");

    assert!(status.is_none());
}
