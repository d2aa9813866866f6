// crates/watchgate-core/src/core/quota.rs
// ============================================================================
// Module: Watchgate Quota Model
// Description: Per-user quota configuration, usage rows, and status
//              snapshots.
// Purpose: Model the append-only usage ledger backing approval gating.
// Dependencies: crate::core::{content, identifiers}, serde, time
// ============================================================================

//! ## Overview
//! A user quota caps accepted requests within a daily, weekly-rolling, or
//! monthly window. Usage is an append-only ledger with one row per accepted
//! request at day granularity; counts reflect actual consumption, never
//! attempts. The engine computes windows from an explicit `now` supplied by
//! the caller and never reads the wall clock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::Date;

use crate::core::content::ContentType;
use crate::core::identifiers::UserId;

// ============================================================================
// SECTION: Quota Types
// ============================================================================

/// Time window shape of a user quota.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaType {
    /// Calendar-day window resetting at local midnight.
    Daily,
    /// Rolling trailing-7-day window.
    WeeklyRolling,
    /// Calendar-month window resetting at month start.
    Monthly,
}

impl QuotaType {
    /// Returns the stable wire label for the quota type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::WeeklyRolling => "weekly_rolling",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for QuotaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Quota Configuration
// ============================================================================

/// Per-user quota configuration.
///
/// # Invariants
/// - `bypass_approval = true` always reports the quota as not exceeded,
///   regardless of usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuota {
    /// User the quota applies to.
    pub user_id: UserId,
    /// Window shape.
    pub quota_type: QuotaType,
    /// Maximum accepted requests within the window.
    pub quota_limit: u32,
    /// Admin override: always route regardless of usage.
    pub bypass_approval: bool,
}

// ============================================================================
// SECTION: Usage Ledger
// ============================================================================

/// One accepted request in the usage ledger.
///
/// # Invariants
/// - Rows are append-only; a retention sweep is the only deletion path and
///   is unrelated to correctness.
/// - `request_date` is day-granular in the deployment's local calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    /// User who made the request.
    pub user_id: UserId,
    /// Content type of the request.
    pub content_type: ContentType,
    /// Calendar day the request was accepted.
    pub request_date: Date,
}

// ============================================================================
// SECTION: Quota Status
// ============================================================================

/// Quota status snapshot for one user and content type.
///
/// # Invariants
/// - `exceeded` is false whenever `bypass_approval` is true.
/// - `reset_date` is `None` only for a weekly-rolling quota with no counted
///   usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    /// Window shape of the configured quota.
    pub quota_type: QuotaType,
    /// Configured limit.
    pub quota_limit: u32,
    /// Accepted requests counted in the current window.
    pub current_usage: u64,
    /// Whether the next request must be deferred for approval.
    pub exceeded: bool,
    /// Day the window resets.
    pub reset_date: Option<Date>,
    /// Admin override reported downstream.
    pub bypass_approval: bool,
}
