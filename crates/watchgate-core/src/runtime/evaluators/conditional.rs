// crates/watchgate-core/src/runtime/evaluators/conditional.rs
// ============================================================================
// Module: Conditional Evaluator
// Description: Condition-tree rules composing the other evaluator families.
// Purpose: Match rules whose criteria is a full boolean condition tree,
//          interpreted over the leaf evaluators.
// Dependencies: crate::core, crate::runtime::{evaluators, interpreter}
// ============================================================================

//! ## Overview
//! The conditional family carries the highest priority because its rules
//! can reference and compose every other family through the condition
//! interpreter. It claims no condition field itself, which keeps leaf
//! dispatch acyclic: trees reference `genre`, `year`, `original_language`,
//! `certification`, and `user` leaves, never `conditional`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::Condition;
use crate::core::ContentItem;
use crate::core::RoutingContext;
use crate::core::RuleCriteria;
use crate::core::RuleFamily;
use crate::core::TargetService;
use crate::interfaces::RuleStore;
use crate::runtime::evaluators::Evaluator;
use crate::runtime::evaluators::EvaluatorMetadata;
use crate::runtime::evaluators::LeafEvaluators;
use crate::runtime::evaluators::RouteMatch;
use crate::runtime::evaluators::family_has_rules;
use crate::runtime::evaluators::fetch_family_rules;
use crate::runtime::interpreter::evaluate_node;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Static evaluation priority for the conditional family (highest).
pub const PRIORITY: u8 = 100;

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Conditional-family evaluator.
pub struct ConditionalEvaluator {
    /// Rule storage collaborator.
    rules: Arc<dyn RuleStore>,
    /// Leaf evaluators the interpreter dispatches to.
    leaves: Arc<LeafEvaluators>,
}

impl ConditionalEvaluator {
    /// Creates a conditional evaluator over the given rule store and leaf
    /// set.
    #[must_use]
    pub const fn new(rules: Arc<dyn RuleStore>, leaves: Arc<LeafEvaluators>) -> Self {
        Self {
            rules,
            leaves,
        }
    }
}

impl Evaluator for ConditionalEvaluator {
    fn family(&self) -> RuleFamily {
        RuleFamily::Conditional
    }

    fn priority(&self) -> u8 {
        PRIORITY
    }

    fn can_evaluate(&self, _item: &ContentItem, ctx: &RoutingContext) -> bool {
        family_has_rules(
            &self.rules,
            RuleFamily::Conditional,
            TargetService::for_content_type(ctx.content_type),
        )
    }

    fn evaluate(&self, item: &ContentItem, ctx: &RoutingContext) -> Option<Vec<RouteMatch>> {
        let service = TargetService::for_content_type(ctx.content_type);
        let rules = fetch_family_rules(&self.rules, RuleFamily::Conditional, service);
        let matches: Vec<RouteMatch> = rules
            .iter()
            .filter(|rule| match &rule.criteria {
                RuleCriteria::Condition {
                    root,
                } => evaluate_node(root, item, ctx, &self.leaves),
                _ => {
                    tracing::warn!(
                        rule = %rule.id,
                        "conditional rule carries foreign criteria; skipped"
                    );
                    false
                }
            })
            .map(RouteMatch::from_rule)
            .collect();
        if matches.is_empty() { None } else { Some(matches) }
    }

    fn evaluate_condition(
        &self,
        _condition: &Condition,
        _item: &ContentItem,
        _ctx: &RoutingContext,
    ) -> bool {
        // The conditional family never appears as a leaf target.
        false
    }

    fn can_evaluate_condition_field(&self, _field: &str) -> bool {
        false
    }

    fn metadata(&self) -> EvaluatorMetadata {
        EvaluatorMetadata {
            family: RuleFamily::Conditional,
            description: "Routes content by composed condition trees".to_string(),
            fields: Vec::new(),
        }
    }
}
