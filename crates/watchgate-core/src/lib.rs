// crates/watchgate-core/src/lib.rs
// ============================================================================
// Module: Watchgate Core
// Description: Content routing and approval-gating decision engine.
// Purpose: Decide, for every watchlist item, which download-manager
//          instances receive it, under what configuration, and whether the
//          action defers for human approval.
// Dependencies: regex, serde, serde_json, thiserror, time, tracing
// ============================================================================

//! ## Overview
//! Watchgate core is the decision engine of a watchlist synchronization
//! service. A priority-ordered set of rule evaluators matches admin-
//! authored router rules against content items; a recursive condition
//! interpreter handles arbitrarily nested AND/OR/NOT criteria; the resolver
//! aggregates matches into per-instance routing verdicts; and a quota-aware
//! approval gate either passes verdicts to the acquisition workflow or
//! persists them for deferred admin approval and verbatim replay.
//!
//! The engine is deterministic: it never reads the wall clock (callers
//! supply `now`), evaluation inputs are immutable snapshots, and all
//! evaluator results are collected before conflicts resolve. Storage
//! backends and the acquisition workflow plug in through the
//! [`interfaces`] traits.

/// Core data model.
pub mod core;
/// Backend-agnostic interface traits.
pub mod interfaces;
/// Engine runtime components.
pub mod runtime;

pub use crate::core::ApprovalContext;
pub use crate::core::ApprovalRequest;
pub use crate::core::ApprovalRequestDraft;
pub use crate::core::ApprovalRequestId;
pub use crate::core::ApprovalStatus;
pub use crate::core::ApprovalTrigger;
pub use crate::core::AcquisitionCommand;
pub use crate::core::AcquisitionReceipt;
pub use crate::core::BooleanOperator;
pub use crate::core::Condition;
pub use crate::core::ConditionError;
pub use crate::core::ConditionGroup;
pub use crate::core::ConditionNode;
pub use crate::core::ConditionOperator;
pub use crate::core::ConditionValue;
pub use crate::core::ContentItem;
pub use crate::core::ContentMetadata;
pub use crate::core::ContentType;
pub use crate::core::FieldInfo;
pub use crate::core::Guid;
pub use crate::core::GuidParseError;
pub use crate::core::InstanceConfig;
pub use crate::core::InstanceId;
pub use crate::core::MAX_CONDITION_NESTING;
pub use crate::core::NumberRange;
pub use crate::core::QuotaStatus;
pub use crate::core::QuotaType;
pub use crate::core::QuotaUsage;
pub use crate::core::RouterDecision;
pub use crate::core::RouterRule;
pub use crate::core::RouterRuleDraft;
pub use crate::core::RoutingContext;
pub use crate::core::RoutingDecision;
pub use crate::core::RuleCriteria;
pub use crate::core::RuleFamily;
pub use crate::core::RuleId;
pub use crate::core::SeriesType;
pub use crate::core::TargetService;
pub use crate::core::UserAttribution;
pub use crate::core::UserCriterion;
pub use crate::core::UserId;
pub use crate::core::UserQuota;
pub use crate::core::YearCriterion;
pub use crate::core::validate_condition_tree;
