// crates/watchgate-core/src/core/mod.rs
// ============================================================================
// Module: Watchgate Core Model
// Description: Data model shared by the engine, stores, and collaborators.
// Purpose: Re-export the canonical content, rule, decision, quota, and
//          approval types.
// Dependencies: submodules
// ============================================================================

//! ## Overview
//! The core model is pure data: content snapshots, admin-authored rules,
//! routing decisions, quota records, and approval requests. Runtime
//! behavior lives in [`crate::runtime`]; backend contracts live in
//! [`crate::interfaces`].

/// Approval request records and lifecycle status.
pub mod approval;
/// Condition trees and save-time validation.
pub mod condition;
/// Content items, guids, and routing context.
pub mod content;
/// Routing decisions, verdicts, and acquisition commands.
pub mod decision;
/// Strongly typed identifiers.
pub mod identifiers;
/// Quota configuration, usage ledger, and status snapshots.
pub mod quota;
/// Router rules, criteria shorthands, and instance configuration.
pub mod rules;

pub use approval::ApprovalRequest;
pub use approval::ApprovalRequestDraft;
pub use approval::ApprovalStatus;
pub use condition::BooleanOperator;
pub use condition::Condition;
pub use condition::ConditionError;
pub use condition::ConditionGroup;
pub use condition::ConditionNode;
pub use condition::ConditionOperator;
pub use condition::ConditionValue;
pub use condition::FieldInfo;
pub use condition::MAX_CONDITION_NESTING;
pub use condition::NumberRange;
pub use condition::validate_condition_tree;
pub use content::ContentItem;
pub use content::ContentMetadata;
pub use content::ContentType;
pub use content::Guid;
pub use content::GuidParseError;
pub use content::RoutingContext;
pub use content::UserAttribution;
pub use decision::AcquisitionCommand;
pub use decision::AcquisitionReceipt;
pub use decision::ApprovalContext;
pub use decision::ApprovalTrigger;
pub use decision::RouterDecision;
pub use decision::RoutingDecision;
pub use identifiers::ApprovalRequestId;
pub use identifiers::InstanceId;
pub use identifiers::RuleId;
pub use identifiers::UserId;
pub use quota::QuotaStatus;
pub use quota::QuotaType;
pub use quota::QuotaUsage;
pub use quota::UserQuota;
pub use rules::InstanceConfig;
pub use rules::RouterRule;
pub use rules::RouterRuleDraft;
pub use rules::RuleCriteria;
pub use rules::RuleFamily;
pub use rules::SeriesType;
pub use rules::TargetService;
pub use rules::UserCriterion;
pub use rules::YearCriterion;
