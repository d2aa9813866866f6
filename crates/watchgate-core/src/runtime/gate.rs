// crates/watchgate-core/src/runtime/gate.rs
// ============================================================================
// Module: Approval Gate
// Description: Quota-aware interception of resolved routing decisions.
// Purpose: Pass admitted decisions to the acquisition workflow or persist
//          them as pending approval requests.
// Dependencies: crate::core, crate::interfaces, crate::runtime::quota
// ============================================================================

//! ## Overview
//! The gate sits between the resolver and the acquisition workflow. Rule-
//! forced and manually flagged requests defer immediately, bypassing the
//! quota check entirely (rule-author and producer intent, not a fallback).
//! Otherwise the requesting user's quota decides: within limits the
//! decisions dispatch and exactly one usage row is recorded for the item;
//! exceeded quotas persist a pending approval request carrying the full
//! proposed routing set, and no usage row is written until approval.
//!
//! Persistence and quota-read failures propagate to the caller as failed
//! operations; the gate never silently routes or silently drops a request
//! on storage trouble.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::AcquisitionCommand;
use crate::core::AcquisitionReceipt;
use crate::core::ApprovalContext;
use crate::core::ApprovalRequest;
use crate::core::ApprovalRequestDraft;
use crate::core::ApprovalTrigger;
use crate::core::ContentItem;
use crate::core::QuotaStatus;
use crate::core::RouterDecision;
use crate::core::RoutingContext;
use crate::core::RoutingDecision;
use crate::core::UserId;
use crate::interfaces::AcquisitionDispatcher;
use crate::interfaces::ApprovalStore;
use crate::interfaces::ApprovalStoreError;
use crate::interfaces::DispatchError;
use crate::interfaces::QuotaStoreError;
use crate::runtime::quota::QuotaTracker;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gate errors surfaced to the caller for retry.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum GateError {
    /// Quota status could not be read; the request was neither routed nor
    /// recorded.
    #[error(transparent)]
    Quota(#[from] QuotaStoreError),
    /// Approval request persistence failed; the routing decision was not
    /// executed.
    #[error(transparent)]
    Approvals(#[from] ApprovalStoreError),
    /// The acquisition workflow failed a command.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Approval is required but the context carries no attributable user.
    #[error("approval required but no user is attributed to the request")]
    MissingUserAttribution,
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Per-item outcome of gating a decision set.
///
/// # Invariants
/// - `Dispatched` receipts are in decision order.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// Decisions were admitted and dispatched.
    Dispatched {
        /// Receipts returned by the acquisition workflow.
        receipts: Vec<AcquisitionReceipt>,
    },
    /// Decisions were deferred behind a pending approval request.
    Deferred {
        /// The persisted pending request.
        request: ApprovalRequest,
    },
    /// The resolver rejected the item.
    Rejected {
        /// Optional rejection reason.
        reason: Option<String>,
    },
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Quota-aware approval gate.
pub struct ApprovalGate {
    /// Quota tracker.
    quotas: QuotaTracker,
    /// Approval request storage.
    approvals: Arc<dyn ApprovalStore>,
    /// Acquisition workflow handle.
    dispatcher: Arc<dyn AcquisitionDispatcher>,
}

impl ApprovalGate {
    /// Creates a gate over the given collaborators.
    #[must_use]
    pub const fn new(
        quotas: QuotaTracker,
        approvals: Arc<dyn ApprovalStore>,
        dispatcher: Arc<dyn AcquisitionDispatcher>,
    ) -> Self {
        Self {
            quotas,
            approvals,
            dispatcher,
        }
    }

    /// Gates a resolved decision set for one content item.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when quota reads, approval persistence, or
    /// dispatch fail; the caller decides whether to retry the whole event.
    pub fn admit(
        &self,
        item: &ContentItem,
        ctx: &RoutingContext,
        decisions: &[RouterDecision],
        now: OffsetDateTime,
    ) -> Result<Vec<GateOutcome>, GateError> {
        let mut outcomes = Vec::new();
        let mut routes: Vec<RoutingDecision> = Vec::new();

        for decision in decisions {
            match decision {
                RouterDecision::Route {
                    routing,
                } => routes.push(routing.clone()),
                RouterDecision::RequireApproval {
                    approval,
                } => {
                    let request = self.defer(item, ctx, approval.clone(), now)?;
                    outcomes.push(GateOutcome::Deferred {
                        request,
                    });
                }
                RouterDecision::Reject {
                    reason,
                } => outcomes.push(GateOutcome::Rejected {
                    reason: reason.clone(),
                }),
                RouterDecision::Continue => {}
            }
        }

        if routes.is_empty() {
            return Ok(outcomes);
        }

        if ctx.manual_approval_required {
            let approval = ApprovalContext {
                reason: "request flagged for manual review".to_string(),
                triggered_by: ApprovalTrigger::ManualFlag,
                router_rule_id: None,
                data: None,
                proposed_routing: routes,
            };
            let request = self.defer(item, ctx, approval, now)?;
            outcomes.push(GateOutcome::Deferred {
                request,
            });
            return Ok(outcomes);
        }

        if let Some(user_id) = ctx.primary_user_id() {
            let status = self.quotas.status(user_id, ctx.content_type, now)?;
            if let Some(status) = status
                && status.exceeded
            {
                let approval = quota_approval_context(&status, routes);
                let request = self.defer(item, ctx, approval, now)?;
                outcomes.push(GateOutcome::Deferred {
                    request,
                });
                return Ok(outcomes);
            }
            let receipts = self.dispatch_all(item, ctx, &routes)?;
            self.quotas.record(user_id, ctx.content_type, now)?;
            outcomes.push(GateOutcome::Dispatched {
                receipts,
            });
            return Ok(outcomes);
        }

        // No attributed user: nothing to count against, route directly.
        let receipts = self.dispatch_all(item, ctx, &routes)?;
        outcomes.push(GateOutcome::Dispatched {
            receipts,
        });
        Ok(outcomes)
    }

    /// Dispatches every admitted routing decision.
    fn dispatch_all(
        &self,
        item: &ContentItem,
        ctx: &RoutingContext,
        routes: &[RoutingDecision],
    ) -> Result<Vec<AcquisitionReceipt>, GateError> {
        let mut receipts = Vec::with_capacity(routes.len());
        for routing in routes {
            let command = AcquisitionCommand {
                content_type: ctx.content_type,
                title: item.title.clone(),
                guids: item.guids.clone(),
                routing: routing.clone(),
            };
            receipts.push(self.dispatcher.dispatch(&command)?);
        }
        Ok(receipts)
    }

    /// Persists a deferred decision as a pending approval request.
    fn defer(
        &self,
        item: &ContentItem,
        ctx: &RoutingContext,
        approval: ApprovalContext,
        now: OffsetDateTime,
    ) -> Result<ApprovalRequest, GateError> {
        let user_id = attributed_user(ctx)?;
        let draft = ApprovalRequestDraft {
            user_id,
            content_type: ctx.content_type,
            content_title: item.title.clone(),
            content_key: content_key(item),
            content_guids: item.guids.clone(),
            router_rule_id: approval.router_rule_id,
            triggered_by: approval.triggered_by,
            approval_reason: Some(approval.reason.clone()),
            proposed_decision: RouterDecision::RequireApproval {
                approval,
            },
            expires_at: None,
        };
        Ok(self.approvals.create(draft, now)?)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the primary attributed user or fails loudly.
///
/// Approval requests are per-user records; deferring without attribution
/// would orphan the request, so the gate surfaces the condition instead of
/// silently dropping or routing the content.
fn attributed_user(ctx: &RoutingContext) -> Result<UserId, GateError> {
    ctx.primary_user_id().ok_or(GateError::MissingUserAttribution)
}

/// Builds the approval context for a quota-exceeded deferral.
fn quota_approval_context(status: &QuotaStatus, routes: Vec<RoutingDecision>) -> ApprovalContext {
    ApprovalContext {
        reason: format!(
            "{} quota exceeded: {} of {} used",
            status.quota_type, status.current_usage, status.quota_limit
        ),
        triggered_by: ApprovalTrigger::QuotaExceeded,
        router_rule_id: None,
        data: Some(json!({
            "quota_type": status.quota_type,
            "quota_limit": status.quota_limit,
            "current_usage": status.current_usage,
            "reset_date": status.reset_date.map(|date| date.to_string()),
        })),
        proposed_routing: routes,
    }
}

/// Returns a stable content key for approval deduplication.
fn content_key(item: &ContentItem) -> String {
    item.guids
        .first()
        .map_or_else(|| item.title.trim().to_lowercase(), ToString::to_string)
}
