// crates/watchgate-core/src/runtime/lifecycle.rs
// ============================================================================
// Module: Approval Lifecycle Manager
// Description: Admin approve/reject/delete actions and the expiry sweep.
// Purpose: Replay stored routing decisions on approval and keep status
//          transitions terminal and race-free.
// Dependencies: crate::core, crate::interfaces, crate::runtime::quota
// ============================================================================

//! ## Overview
//! Approval requests settle exactly once: `pending` moves to `approved`,
//! `rejected`, or `expired` and never reverses. Every settling path runs
//! through the store's conditional "only if still pending" transition, so
//! two admins, or an admin racing the expiry sweep, cannot double-execute
//! or double-expire a request — the loser observes the winner's status.
//!
//! Approval replays the stored routing set verbatim through the
//! acquisition workflow (never recomputed), then records exactly one usage
//! row. Rejection and expiry make no acquisition call and record no usage.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::AcquisitionCommand;
use crate::core::AcquisitionReceipt;
use crate::core::ApprovalRequest;
use crate::core::ApprovalRequestId;
use crate::core::ApprovalStatus;
use crate::core::RouterDecision;
use crate::core::RoutingDecision;
use crate::interfaces::AcquisitionDispatcher;
use crate::interfaces::ApprovalStore;
use crate::interfaces::ApprovalStoreError;
use crate::interfaces::DispatchError;
use crate::interfaces::QuotaStoreError;
use crate::interfaces::TransitionOutcome;
use crate::runtime::quota::QuotaTracker;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Lifecycle operation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Approval store read or write failed.
    #[error(transparent)]
    Approvals(#[from] ApprovalStoreError),
    /// Usage recording failed after replay.
    #[error(transparent)]
    Quota(#[from] QuotaStoreError),
    /// The acquisition workflow failed a replayed command.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// The stored decision carries no routing payload to replay.
    #[error("stored decision has no routing payload: {0}")]
    InvalidStoredDecision(String),
}

// ============================================================================
// SECTION: Actions
// ============================================================================

/// Result of an approve or reject action.
///
/// # Invariants
/// - `AlreadySettled` is a no-op report, never an error; re-submitting a
///   settled request does not corrupt state.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalAction {
    /// The request was approved and its stored decision replayed.
    Approved {
        /// The settled request.
        request: ApprovalRequest,
        /// Receipts from the replayed acquisition commands.
        receipts: Vec<AcquisitionReceipt>,
    },
    /// The request was rejected; no acquisition occurred.
    Rejected {
        /// The settled request.
        request: ApprovalRequest,
    },
    /// The request was already settled; the current status is reported.
    AlreadySettled {
        /// Status observed at action time.
        status: ApprovalStatus,
    },
    /// No request with the given identifier exists.
    NotFound,
}

// ============================================================================
// SECTION: Lifecycle Manager
// ============================================================================

/// Approval lifecycle manager.
pub struct ApprovalLifecycle {
    /// Approval request storage.
    approvals: Arc<dyn ApprovalStore>,
    /// Quota tracker for post-approval usage recording.
    quotas: QuotaTracker,
    /// Acquisition workflow handle for replay.
    dispatcher: Arc<dyn AcquisitionDispatcher>,
}

impl ApprovalLifecycle {
    /// Creates a lifecycle manager over the given collaborators.
    #[must_use]
    pub const fn new(
        approvals: Arc<dyn ApprovalStore>,
        quotas: QuotaTracker,
        dispatcher: Arc<dyn AcquisitionDispatcher>,
    ) -> Self {
        Self {
            approvals,
            quotas,
            dispatcher,
        }
    }

    /// Approves a pending request, replaying its stored decision.
    ///
    /// Idempotent against re-submission: an already settled request reports
    /// its current status without dispatching.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the transition, replay, or usage
    /// write fails. A replay failure leaves the request approved; the
    /// caller retries the acquisition out of band.
    pub fn approve(
        &self,
        id: ApprovalRequestId,
        approved_by: &str,
        notes: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<ApprovalAction, LifecycleError> {
        let outcome = self.approvals.transition_if_pending(
            id,
            ApprovalStatus::Approved,
            Some(approved_by),
            notes,
            now,
        )?;
        match outcome {
            TransitionOutcome::Applied(request) => {
                let routings = stored_routings(&request)?;
                let receipts = self.replay(&request, &routings)?;
                self.quotas.record(request.user_id, request.content_type, now)?;
                Ok(ApprovalAction::Approved {
                    request,
                    receipts,
                })
            }
            TransitionOutcome::AlreadySettled(status) => Ok(ApprovalAction::AlreadySettled {
                status,
            }),
            TransitionOutcome::NotFound => Ok(ApprovalAction::NotFound),
        }
    }

    /// Rejects a pending request; no acquisition call is made and no usage
    /// is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the transition fails.
    pub fn reject(
        &self,
        id: ApprovalRequestId,
        rejected_by: &str,
        reason: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<ApprovalAction, LifecycleError> {
        let outcome = self.approvals.transition_if_pending(
            id,
            ApprovalStatus::Rejected,
            Some(rejected_by),
            reason,
            now,
        )?;
        match outcome {
            TransitionOutcome::Applied(request) => Ok(ApprovalAction::Rejected {
                request,
            }),
            TransitionOutcome::AlreadySettled(status) => Ok(ApprovalAction::AlreadySettled {
                status,
            }),
            TransitionOutcome::NotFound => Ok(ApprovalAction::NotFound),
        }
    }

    /// Permanently removes a request record; recorded usage is unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when deletion fails.
    pub fn delete(&self, id: ApprovalRequestId) -> Result<bool, LifecycleError> {
        Ok(self.approvals.delete(id)?)
    }

    /// Expires every pending request whose deadline has passed.
    ///
    /// Invoked periodically by the host scheduler; expired requests make no
    /// acquisition call and can no longer be approved.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the sweep fails.
    pub fn expire_due(&self, now: OffsetDateTime) -> Result<u64, LifecycleError> {
        Ok(self.approvals.expire_due(now)?)
    }

    /// Replays the stored routing set through the acquisition workflow.
    fn replay(
        &self,
        request: &ApprovalRequest,
        routings: &[RoutingDecision],
    ) -> Result<Vec<AcquisitionReceipt>, DispatchError> {
        let mut receipts = Vec::with_capacity(routings.len());
        for routing in routings {
            let command = AcquisitionCommand {
                content_type: request.content_type,
                title: request.content_title.clone(),
                guids: request.content_guids.clone(),
                routing: routing.clone(),
            };
            receipts.push(self.dispatcher.dispatch(&command)?);
        }
        Ok(receipts)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the replayable routing set from a stored decision.
fn stored_routings(request: &ApprovalRequest) -> Result<Vec<RoutingDecision>, LifecycleError> {
    let routings = match &request.proposed_decision {
        RouterDecision::RequireApproval {
            approval,
        } => approval.proposed_routing.clone(),
        RouterDecision::Route {
            routing,
        } => vec![routing.clone()],
        RouterDecision::Reject {
            ..
        }
        | RouterDecision::Continue => Vec::new(),
    };
    if routings.is_empty() {
        return Err(LifecycleError::InvalidStoredDecision(request.id.to_string()));
    }
    Ok(routings)
}
