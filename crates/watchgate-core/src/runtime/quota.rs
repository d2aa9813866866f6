// crates/watchgate-core/src/runtime/quota.rs
// ============================================================================
// Module: Quota Tracker
// Description: Window computation over the append-only usage ledger.
// Purpose: Answer whether a user has exceeded a configured quota and when
//          the window resets.
// Dependencies: crate::core, crate::interfaces, time
// ============================================================================

//! ## Overview
//! The tracker computes usage windows from day-granularity ledger rows and
//! an explicit `now` supplied by the caller:
//!
//! - `daily`: rows dated today; resets at the next local midnight.
//! - `weekly_rolling`: rows within the trailing seven calendar days; resets
//!   seven days after the oldest counted row.
//! - `monthly`: rows within the current calendar month; resets at the first
//!   day of the next month.
//!
//! `bypass_approval` always reports the quota as not exceeded downstream.
//! Usage is recorded only when a request is accepted for routing (routed
//! immediately or approved later), never for rejected or pending requests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use time::Date;
use time::Duration;
use time::Month;
use time::OffsetDateTime;

use crate::core::ContentType;
use crate::core::QuotaStatus;
use crate::core::QuotaType;
use crate::core::QuotaUsage;
use crate::core::UserId;
use crate::interfaces::QuotaStore;
use crate::interfaces::QuotaStoreError;

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Quota tracker over a quota store.
pub struct QuotaTracker {
    /// Quota storage collaborator.
    store: Arc<dyn QuotaStore>,
}

impl QuotaTracker {
    /// Creates a tracker over the given store.
    #[must_use]
    pub const fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self {
            store,
        }
    }

    /// Returns the quota status for a user and content type, or `None`
    /// when the user has no quota configured.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaStoreError`] when the store cannot be read; callers
    /// must treat this as a failed operation, not an open gate.
    pub fn status(
        &self,
        user_id: UserId,
        content_type: ContentType,
        now: OffsetDateTime,
    ) -> Result<Option<QuotaStatus>, QuotaStoreError> {
        let Some(quota) = self.store.user_quota(user_id)? else {
            return Ok(None);
        };
        let today = now.date();
        let (from, to) = window_bounds(quota.quota_type, today);
        let current_usage = self.store.usage_count_between(user_id, content_type, from, to)?;
        let reset_date = match quota.quota_type {
            QuotaType::Daily => today.next_day(),
            QuotaType::WeeklyRolling => self
                .store
                .oldest_usage_between(user_id, content_type, from, to)?
                .and_then(|oldest| oldest.checked_add(Duration::days(7))),
            QuotaType::Monthly => next_month_start(today),
        };
        let exceeded = !quota.bypass_approval && current_usage >= u64::from(quota.quota_limit);
        Ok(Some(QuotaStatus {
            quota_type: quota.quota_type,
            quota_limit: quota.quota_limit,
            current_usage,
            exceeded,
            reset_date,
            bypass_approval: quota.bypass_approval,
        }))
    }

    /// Appends one accepted-request row to the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaStoreError`] when the write fails; a failed write is
    /// not recorded and the caller must surface the failure.
    pub fn record(
        &self,
        user_id: UserId,
        content_type: ContentType,
        now: OffsetDateTime,
    ) -> Result<(), QuotaStoreError> {
        self.store.record_usage(QuotaUsage {
            user_id,
            content_type,
            request_date: now.date(),
        })
    }
}

// ============================================================================
// SECTION: Window Math
// ============================================================================

/// Returns the inclusive `[from, to]` ledger window for a quota type.
fn window_bounds(quota_type: QuotaType, today: Date) -> (Date, Date) {
    match quota_type {
        QuotaType::Daily => (today, today),
        QuotaType::WeeklyRolling => {
            let from = today.checked_sub(Duration::days(6)).unwrap_or(today);
            (from, today)
        }
        QuotaType::Monthly => {
            let from = today.replace_day(1).unwrap_or(today);
            (from, today)
        }
    }
}

/// Returns the first day of the month after `today`.
fn next_month_start(today: Date) -> Option<Date> {
    let (year, month) = match today.month() {
        Month::December => (today.year().checked_add(1)?, Month::January),
        other => (today.year(), other.next()),
    };
    Date::from_calendar_date(year, month, 1).ok()
}
