// crates/watchgate-core/tests/proptest_conditions.rs
// ============================================================================
// Module: Condition Interpreter Property Tests
// Description: Property tests for boolean identities over random trees.
// Purpose: Detect panics and negation/identity violations across wide
//          input ranges.
// ============================================================================

//! Property-based tests for interpreter invariants: negation involution,
//! AND/OR identities, and panic freedom on arbitrary trees.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::sync::Arc;

use common::movie_ctx;
use common::movie_item;
use proptest::prelude::*;
use watchgate_core::BooleanOperator;
use watchgate_core::Condition;
use watchgate_core::ConditionGroup;
use watchgate_core::ConditionNode;
use watchgate_core::ConditionOperator;
use watchgate_core::ConditionValue;
use watchgate_core::runtime::EvaluatorRegistry;
use watchgate_core::runtime::InMemoryStores;
use watchgate_core::runtime::evaluate_node;

// ============================================================================
// SECTION: Strategies
// ============================================================================

/// Strategy over genre leaf conditions with random fields and negation.
fn leaf_strategy() -> impl Strategy<Value = ConditionNode> {
    let field = prop_oneof![
        Just("genre".to_string()),
        Just("user".to_string()),
        Just("unknown_field".to_string()),
    ];
    let operator = prop_oneof![
        Just(ConditionOperator::In),
        Just(ConditionOperator::NotIn),
        Just(ConditionOperator::Equals),
    ];
    (field, operator, prop::collection::vec("[A-Za-z]{1,8}", 0 .. 3), any::<bool>()).prop_map(
        |(field, operator, values, negate)| {
            ConditionNode::Leaf(Condition {
                field,
                operator,
                value: ConditionValue::TextList(values),
                negate,
            })
        },
    )
}

/// Strategy over arbitrary condition trees.
fn tree_strategy() -> impl Strategy<Value = ConditionNode> {
    leaf_strategy().prop_recursive(4, 24, 4, |inner| {
        (
            prop_oneof![Just(BooleanOperator::And), Just(BooleanOperator::Or)],
            prop::collection::vec(inner, 0 .. 4),
            any::<bool>(),
        )
            .prop_map(|(operator, conditions, negate)| {
                ConditionNode::Group(ConditionGroup {
                    operator,
                    conditions,
                    negate,
                })
            })
    })
}

/// Wraps a node in a single-child AND group carrying a negation.
fn negated(node: ConditionNode) -> ConditionNode {
    ConditionNode::Group(ConditionGroup {
        operator: BooleanOperator::And,
        conditions: vec![node],
        negate: true,
    })
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn interpretation_never_panics(tree in tree_strategy()) {
        let stores = Arc::new(InMemoryStores::new());
        let registry = EvaluatorRegistry::with_default_families(stores, None);
        let item = movie_item("Prop Item", &["Drama", "Comedy"]);
        let ctx = movie_ctx(3);
        let _ = evaluate_node(&tree, &item, &ctx, registry.leaves());
    }

    #[test]
    fn double_negation_is_an_involution(tree in tree_strategy()) {
        let stores = Arc::new(InMemoryStores::new());
        let registry = EvaluatorRegistry::with_default_families(stores, None);
        let item = movie_item("Prop Item", &["Drama", "Comedy"]);
        let ctx = movie_ctx(3);

        let plain = evaluate_node(&tree, &item, &ctx, registry.leaves());
        let twice = negated(negated(tree));
        let restored = evaluate_node(&twice, &item, &ctx, registry.leaves());
        prop_assert_eq!(plain, restored);
    }

    #[test]
    fn and_with_empty_group_is_identity(tree in tree_strategy()) {
        let stores = Arc::new(InMemoryStores::new());
        let registry = EvaluatorRegistry::with_default_families(stores, None);
        let item = movie_item("Prop Item", &["Drama", "Comedy"]);
        let ctx = movie_ctx(3);

        let plain = evaluate_node(&tree, &item, &ctx, registry.leaves());
        let empty_and = ConditionNode::Group(ConditionGroup {
            operator: BooleanOperator::And,
            conditions: Vec::new(),
            negate: false,
        });
        let joined = ConditionNode::Group(ConditionGroup {
            operator: BooleanOperator::And,
            conditions: vec![tree, empty_and],
            negate: false,
        });
        let with_identity = evaluate_node(&joined, &item, &ctx, registry.leaves());
        prop_assert_eq!(plain, with_identity);
    }

    #[test]
    fn or_with_empty_group_is_identity(tree in tree_strategy()) {
        let stores = Arc::new(InMemoryStores::new());
        let registry = EvaluatorRegistry::with_default_families(stores, None);
        let item = movie_item("Prop Item", &["Drama", "Comedy"]);
        let ctx = movie_ctx(3);

        let plain = evaluate_node(&tree, &item, &ctx, registry.leaves());
        let empty_or = ConditionNode::Group(ConditionGroup {
            operator: BooleanOperator::Or,
            conditions: Vec::new(),
            negate: false,
        });
        let joined = ConditionNode::Group(ConditionGroup {
            operator: BooleanOperator::Or,
            conditions: vec![tree, empty_or],
            negate: false,
        });
        let with_identity = evaluate_node(&joined, &item, &ctx, registry.leaves());
        prop_assert_eq!(plain, with_identity);
    }
}
