// crates/watchgate-core/src/core/approval.rs
// ============================================================================
// Module: Watchgate Approval Requests
// Description: Deferred routing decisions awaiting admin action.
// Purpose: Persist a resolved decision for later verbatim replay.
// Dependencies: crate::core::{content, decision, identifiers}, serde, time
// ============================================================================

//! ## Overview
//! An approval request freezes a routing decision at request time. Status
//! transitions only move `pending -> {approved, rejected, expired}` and
//! never reverse; the stored decision is replayed verbatim on approval so
//! routing reflects the rule set as it stood when the request was made.
//! Requests are created by the approval gate and mutated only by the
//! lifecycle manager.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::content::ContentType;
use crate::core::content::Guid;
use crate::core::decision::ApprovalTrigger;
use crate::core::decision::RouterDecision;
use crate::core::identifiers::ApprovalRequestId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::UserId;

// ============================================================================
// SECTION: Approval Status
// ============================================================================

/// Lifecycle status of an approval request.
///
/// # Invariants
/// - Transitions only leave `Pending`; settled states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting admin action.
    Pending,
    /// Approved; the stored decision was replayed.
    Approved,
    /// Rejected; no acquisition occurred.
    Rejected,
    /// Expired by the sweep; no acquisition occurred.
    Expired,
}

impl ApprovalStatus {
    /// Returns the stable wire label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    /// Parses a stable wire label back into a status.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Approval Requests
// ============================================================================

/// Persisted approval request.
///
/// # Invariants
/// - Exactly one `proposed_decision` is stored per request and replayed
///   verbatim (never recomputed) on approval.
/// - `approved_by`/`approval_notes` are set only by a settling transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Request identifier assigned by the store.
    pub id: ApprovalRequestId,
    /// Requesting user.
    pub user_id: UserId,
    /// Content type of the deferred request.
    pub content_type: ContentType,
    /// Content title at request time.
    pub content_title: String,
    /// Stable content key for deduplication by the approval surface.
    pub content_key: String,
    /// Typed external identifiers at request time.
    pub content_guids: Vec<Guid>,
    /// The deferred router decision, replayed verbatim on approval.
    pub proposed_decision: RouterDecision,
    /// Rule that forced the deferral, when one did.
    pub router_rule_id: Option<RuleId>,
    /// What caused the deferral.
    pub triggered_by: ApprovalTrigger,
    /// Human-readable deferral reason.
    pub approval_reason: Option<String>,
    /// Lifecycle status.
    pub status: ApprovalStatus,
    /// Admin who settled the request.
    pub approved_by: Option<String>,
    /// Notes recorded by the settling admin.
    pub approval_notes: Option<String>,
    /// Deadline after which the expiry sweep settles the request.
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last mutation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Approval request payload submitted to a store for persistence.
///
/// # Invariants
/// - Field semantics match [`ApprovalRequest`]; the store assigns the
///   identifier, stamps timestamps, and sets `status = Pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequestDraft {
    /// Requesting user.
    pub user_id: UserId,
    /// Content type of the deferred request.
    pub content_type: ContentType,
    /// Content title at request time.
    pub content_title: String,
    /// Stable content key for deduplication by the approval surface.
    pub content_key: String,
    /// Typed external identifiers at request time.
    pub content_guids: Vec<Guid>,
    /// The deferred router decision.
    pub proposed_decision: RouterDecision,
    /// Rule that forced the deferral, when one did.
    pub router_rule_id: Option<RuleId>,
    /// What caused the deferral.
    pub triggered_by: ApprovalTrigger,
    /// Human-readable deferral reason.
    pub approval_reason: Option<String>,
    /// Deadline after which the expiry sweep settles the request.
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}
