// crates/watchgate-core/src/core/decision.rs
// ============================================================================
// Module: Watchgate Routing Decisions
// Description: Routing decisions, router verdicts, and acquisition commands.
// Purpose: Capture the resolver's output in stable, replayable wire forms.
// Dependencies: crate::core::{content, identifiers, rules}, serde, time
// ============================================================================

//! ## Overview
//! A [`RoutingDecision`] is one concrete (instance, configuration) pairing
//! produced by a rule match. The resolver's final verdict is a
//! [`RouterDecision`], a tagged union over route / require-approval /
//! reject / continue. Require-approval verdicts carry the full proposed
//! routing set so multi-instance fan-out survives the approval boundary and
//! is replayed verbatim, never recomputed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::core::content::ContentType;
use crate::core::content::Guid;
use crate::core::identifiers::InstanceId;
use crate::core::identifiers::RuleId;
use crate::core::rules::SeriesType;
use crate::core::rules::TargetService;

// ============================================================================
// SECTION: Routing Decisions
// ============================================================================

/// One concrete routing target produced by a rule match or fallback.
///
/// # Invariants
/// - `instance_id` references an enabled instance running `service`.
/// - `weight` carries the source rule's priority; the fallback decision
///   uses weight 0 and no `rule_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Target instance identifier.
    pub instance_id: InstanceId,
    /// Target service.
    pub service: TargetService,
    /// Quality profile to apply.
    pub quality_profile: Option<String>,
    /// Root folder to apply.
    pub root_folder: Option<String>,
    /// Tags to apply.
    pub tags: Vec<String>,
    /// Conflict-resolution weight (source rule priority).
    pub weight: i32,
    /// Source rule identifier; `None` for the default-instance fallback.
    pub rule_id: Option<RuleId>,
    /// Search-on-add override.
    pub search_on_add: Option<bool>,
    /// Season monitoring override (Sonarr only).
    pub season_monitoring: Option<String>,
    /// Series type override (Sonarr only).
    pub series_type: Option<SeriesType>,
}

// ============================================================================
// SECTION: Approval Context
// ============================================================================

/// What caused a require-approval verdict.
///
/// # Invariants
/// - Variants are stable for serialization and the approval surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalTrigger {
    /// The requesting user exceeded a configured quota.
    QuotaExceeded,
    /// A matched router rule forces the approval path.
    RouterRule,
    /// The ingestion pipeline flagged the request for manual review.
    ManualFlag,
    /// A matched conditional rule forces the approval path.
    ContentCriteria,
}

/// Approval payload carried by a require-approval verdict.
///
/// # Invariants
/// - `proposed_routing` is the exact decision set that would have applied;
///   it is replayed verbatim on approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalContext {
    /// Human-readable reason shown to admins.
    pub reason: String,
    /// What caused the deferral.
    pub triggered_by: ApprovalTrigger,
    /// Rule that forced the deferral, when one did.
    pub router_rule_id: Option<RuleId>,
    /// Optional structured trigger data (quota snapshot, rule reference).
    pub data: Option<Value>,
    /// Proposed routing set preserved for replay.
    pub proposed_routing: Vec<RoutingDecision>,
}

// ============================================================================
// SECTION: Router Decisions
// ============================================================================

/// Final verdict for a content item, one per target instance when routing.
///
/// # Invariants
/// - Variants are stable for serialization; approval requests persist the
///   `require_approval` form verbatim.
/// - `Continue` signals "this rule explicitly declines, try the next rule"
///   and is distinct from producing no match at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RouterDecision {
    /// Route to one resolved instance.
    Route {
        /// The instance and configuration to use.
        routing: RoutingDecision,
    },
    /// Defer the routing set behind an approval request.
    RequireApproval {
        /// Approval payload, including the proposed routing set.
        approval: ApprovalContext,
    },
    /// Terminal rejection; no routing occurs.
    Reject {
        /// Optional rejection reason.
        reason: Option<String>,
    },
    /// Pass-to-next-rule signal with no routing payload.
    Continue,
}

impl RouterDecision {
    /// Returns the routing payload when this is a route verdict.
    #[must_use]
    pub const fn routing(&self) -> Option<&RoutingDecision> {
        match self {
            Self::Route {
                routing,
            } => Some(routing),
            Self::RequireApproval {
                ..
            }
            | Self::Reject {
                ..
            }
            | Self::Continue => None,
        }
    }

    /// Returns the approval payload when this is a require-approval verdict.
    #[must_use]
    pub const fn approval(&self) -> Option<&ApprovalContext> {
        match self {
            Self::RequireApproval {
                approval,
            } => Some(approval),
            Self::Route {
                ..
            }
            | Self::Reject {
                ..
            }
            | Self::Continue => None,
        }
    }
}

// ============================================================================
// SECTION: Acquisition Commands
// ============================================================================

/// Command handed to the acquisition workflow for one routing decision.
///
/// # Invariants
/// - Carries enough content identity for the workflow to build the target
///   system's request without re-reading engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionCommand {
    /// Content type being acquired.
    pub content_type: ContentType,
    /// Content title.
    pub title: String,
    /// Typed external identifiers for the content.
    pub guids: Vec<Guid>,
    /// Resolved routing to execute.
    pub routing: RoutingDecision,
}

/// Receipt returned by the acquisition workflow after dispatch.
///
/// # Invariants
/// - Returned only after the workflow accepted the command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionReceipt {
    /// Instance that received the command.
    pub instance_id: InstanceId,
    /// Dispatch timestamp reported by the workflow.
    #[serde(with = "time::serde::rfc3339")]
    pub dispatched_at: OffsetDateTime,
}
