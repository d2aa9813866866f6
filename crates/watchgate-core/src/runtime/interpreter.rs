// crates/watchgate-core/src/runtime/interpreter.rs
// ============================================================================
// Module: Condition Interpreter
// Description: Recursive evaluation of condition trees against content.
// Purpose: Combine leaf results with short-circuit AND/OR and single-shot
//          negation, delegating leaves to field evaluators.
// Dependencies: crate::core, crate::runtime::evaluators
// ============================================================================

//! ## Overview
//! The interpreter is a pure, synchronous function over a validated
//! condition tree: no I/O, no side effects given the same item and context.
//! Leaf conditions dispatch to the evaluator claiming the field; a leaf no
//! evaluator claims evaluates false (fail closed). `negate` inverts a
//! node's own result exactly once, after combination; field evaluators
//! never apply it themselves, so negation cannot double-apply.
//!
//! Empty groups use the standard boolean identities: an empty AND group is
//! vacuously true, an empty OR group is vacuously false.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::BooleanOperator;
use crate::core::Condition;
use crate::core::ConditionGroup;
use crate::core::ConditionNode;
use crate::core::ContentItem;
use crate::core::RoutingContext;
use crate::runtime::evaluators::LeafEvaluators;

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates a condition tree against a content item.
#[must_use]
pub fn evaluate_node(
    node: &ConditionNode,
    item: &ContentItem,
    ctx: &RoutingContext,
    leaves: &LeafEvaluators,
) -> bool {
    match node {
        ConditionNode::Leaf(condition) => evaluate_leaf(condition, item, ctx, leaves),
        ConditionNode::Group(group) => evaluate_group(group, item, ctx, leaves),
    }
}

/// Evaluates a leaf by dispatching to the claiming evaluator.
fn evaluate_leaf(
    condition: &Condition,
    item: &ContentItem,
    ctx: &RoutingContext,
    leaves: &LeafEvaluators,
) -> bool {
    let result = match leaves.evaluator_for_field(&condition.field) {
        Some(evaluator) => evaluator.evaluate_condition(condition, item, ctx),
        None => {
            tracing::warn!(field = %condition.field, "no evaluator claims condition field");
            false
        }
    };
    apply_negate(result, condition.negate)
}

/// Evaluates a group with short-circuit combination.
fn evaluate_group(
    group: &ConditionGroup,
    item: &ContentItem,
    ctx: &RoutingContext,
    leaves: &LeafEvaluators,
) -> bool {
    let combined = match group.operator {
        BooleanOperator::And => {
            group.conditions.iter().all(|child| evaluate_node(child, item, ctx, leaves))
        }
        BooleanOperator::Or => {
            group.conditions.iter().any(|child| evaluate_node(child, item, ctx, leaves))
        }
    };
    apply_negate(combined, group.negate)
}

/// Applies a node's negation flag exactly once.
const fn apply_negate(result: bool, negate: bool) -> bool {
    if negate { !result } else { result }
}
