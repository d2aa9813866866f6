// crates/watchgate-core/src/runtime/evaluators/mod.rs
// ============================================================================
// Module: Evaluator Framework
// Description: Evaluator trait, registry, and leaf dispatch for rule
//              families.
// Purpose: Route evaluation and condition-leaf dispatch through a closed set
//          of family evaluators ordered by static priority.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Each rule family (genre, year, language, certification, user,
//! conditional) is one [`Evaluator`] registered in an [`EvaluatorRegistry`]
//! sorted by descending static priority. The conditional family carries the
//! highest priority because it composes the others through the condition
//! interpreter; it never appears as a leaf field itself.
//!
//! Failure semantics: a store or lookup failure inside `can_evaluate` or
//! `evaluate` is absorbed by the owning evaluator (logged, treated as "no
//! rules of this family apply") so a single family's failure never aborts
//! the others.

// ============================================================================
// SECTION: Submodules
// ============================================================================

/// Certification matching.
pub mod certification;
/// Condition-tree matching composing the other families.
pub mod conditional;
/// Genre set matching.
pub mod genre;
/// Original-language matching (lookup-backed).
pub mod language;
/// Requesting-user matching.
pub mod user;
/// Release-year matching (lookup-backed).
pub mod year;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::core::Condition;
use crate::core::ContentItem;
use crate::core::FieldInfo;
use crate::core::RouterRule;
use crate::core::RoutingContext;
use crate::core::RoutingDecision;
use crate::core::RuleFamily;
use crate::core::TargetService;
use crate::interfaces::MetadataLookup;
use crate::interfaces::RuleStore;

// ============================================================================
// SECTION: Route Matches
// ============================================================================

/// One rule match produced by an evaluator.
///
/// # Invariants
/// - `decision.rule_id` is always set; fallback decisions are synthesized
///   by the resolver, never by evaluators.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    /// The routing decision derived from the matched rule.
    pub decision: RoutingDecision,
    /// Family of the evaluator that produced the match.
    pub family: RuleFamily,
    /// Whether the matched rule forces the approval path.
    pub requires_approval: bool,
    /// Reason configured on the matched rule for forced approvals.
    pub approval_reason: Option<String>,
}

impl RouteMatch {
    /// Builds a match from a rule, copying its target configuration.
    #[must_use]
    pub fn from_rule(rule: &RouterRule) -> Self {
        Self {
            decision: RoutingDecision {
                instance_id: rule.instance_id,
                service: rule.service,
                quality_profile: rule.quality_profile.clone(),
                root_folder: rule.root_folder.clone(),
                tags: rule.tags.clone(),
                weight: rule.priority,
                rule_id: Some(rule.id),
                search_on_add: rule.search_on_add,
                season_monitoring: rule.season_monitoring.clone(),
                series_type: rule.series_type,
            },
            family: rule.family,
            requires_approval: rule.require_approval,
            approval_reason: rule.approval_reason.clone(),
        }
    }
}

// ============================================================================
// SECTION: Evaluator Metadata
// ============================================================================

/// Runtime-introspectable evaluator capabilities for the rule-authoring
/// surface.
///
/// # Invariants
/// - `fields` lists every condition field the evaluator claims; the
///   conditional family claims none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorMetadata {
    /// Family the evaluator handles.
    pub family: RuleFamily,
    /// Human-readable description.
    pub description: String,
    /// Condition fields the evaluator claims, with allowed operators.
    pub fields: Vec<FieldInfo>,
}

// ============================================================================
// SECTION: Evaluator Trait
// ============================================================================

/// One rule family's matching logic.
///
/// Implementations are stateless per call and safe to run in parallel;
/// ordering is restored by the resolver, which collects every result before
/// resolving conflicts.
pub trait Evaluator: Send + Sync {
    /// Returns the family this evaluator handles.
    fn family(&self) -> RuleFamily;

    /// Static priority; higher evaluators run first.
    fn priority(&self) -> u8;

    /// Cheap precondition: whether evaluation could produce matches for
    /// this item and context. Store failures are absorbed as `false`.
    fn can_evaluate(&self, item: &ContentItem, ctx: &RoutingContext) -> bool;

    /// Matches the family's enabled rules against the item, returning one
    /// decision per matching rule, or `None` when none match or none apply.
    /// Store and lookup failures are absorbed as `None`.
    fn evaluate(&self, item: &ContentItem, ctx: &RoutingContext) -> Option<Vec<RouteMatch>>;

    /// Evaluates one condition leaf against the item. The leaf's `negate`
    /// flag is applied by the interpreter, never here.
    fn evaluate_condition(
        &self,
        condition: &Condition,
        item: &ContentItem,
        ctx: &RoutingContext,
    ) -> bool;

    /// Returns true when this evaluator claims the condition field.
    fn can_evaluate_condition_field(&self, field: &str) -> bool;

    /// Returns rule-authoring metadata for this evaluator.
    fn metadata(&self) -> EvaluatorMetadata;
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Fetches a family's enabled rules, absorbing store failures.
///
/// Returns an empty vector (with a warning) when the store fails, so a
/// single family's storage trouble never aborts the other families.
fn fetch_family_rules(
    store: &Arc<dyn RuleStore>,
    family: RuleFamily,
    service: TargetService,
) -> Vec<RouterRule> {
    match store.rules_by_family(family, service) {
        Ok(rules) => rules,
        Err(err) => {
            tracing::warn!(family = %family, error = %err, "rule fetch failed; skipping family");
            Vec::new()
        }
    }
}

/// Returns true when a family has at least one enabled rule for the
/// service, absorbing store failures as `false`.
fn family_has_rules(
    store: &Arc<dyn RuleStore>,
    family: RuleFamily,
    service: TargetService,
) -> bool {
    !fetch_family_rules(store, family, service).is_empty()
}

// ============================================================================
// SECTION: Leaf Dispatch
// ============================================================================

/// The leaf-capable evaluators the condition interpreter dispatches to.
///
/// # Invariants
/// - Contains only evaluators that claim at least one condition field; the
///   conditional evaluator is excluded to keep the dispatch acyclic.
pub struct LeafEvaluators {
    /// Leaf-capable evaluators in priority order.
    evaluators: Vec<Arc<dyn Evaluator>>,
}

impl LeafEvaluators {
    /// Creates a leaf set from the given evaluators.
    #[must_use]
    pub const fn new(evaluators: Vec<Arc<dyn Evaluator>>) -> Self {
        Self {
            evaluators,
        }
    }

    /// Returns the first evaluator claiming the given field.
    #[must_use]
    pub fn evaluator_for_field(&self, field: &str) -> Option<&Arc<dyn Evaluator>> {
        self.evaluators.iter().find(|evaluator| evaluator.can_evaluate_condition_field(field))
    }

    /// Returns the aggregated field catalog for rule-save validation.
    #[must_use]
    pub fn field_catalog(&self) -> Vec<FieldInfo> {
        self.evaluators.iter().flat_map(|evaluator| evaluator.metadata().fields).collect()
    }
}

/// Returns the canonical field catalog across all built-in families.
///
/// Stores use this to validate condition trees at rule-save time without
/// instantiating a registry.
#[must_use]
pub fn default_field_catalog() -> Vec<FieldInfo> {
    let mut catalog = genre::field_infos();
    catalog.extend(year::field_infos());
    catalog.extend(language::field_infos());
    catalog.extend(certification::field_infos());
    catalog.extend(user::field_infos());
    catalog
}

// ============================================================================
// SECTION: Evaluator Registry
// ============================================================================

/// Registry of family evaluators sorted by descending priority.
///
/// # Invariants
/// - Families are unique within the registry.
/// - Iteration order is priority-descending and stable.
pub struct EvaluatorRegistry {
    /// All evaluators, priority-descending.
    evaluators: Vec<Arc<dyn Evaluator>>,
    /// Leaf-capable subset used by the condition interpreter.
    leaves: Arc<LeafEvaluators>,
}

impl EvaluatorRegistry {
    /// Creates a registry with the built-in families registered.
    ///
    /// The lookup handle is optional; without one, the year and language
    /// families match only items already carrying metadata.
    #[must_use]
    pub fn with_default_families(
        rule_store: Arc<dyn RuleStore>,
        lookup: Option<Arc<dyn MetadataLookup>>,
    ) -> Self {
        let leaf_list: Vec<Arc<dyn Evaluator>> = vec![
            Arc::new(user::UserEvaluator::new(Arc::clone(&rule_store))),
            Arc::new(language::LanguageEvaluator::new(Arc::clone(&rule_store), lookup.clone())),
            Arc::new(year::YearEvaluator::new(Arc::clone(&rule_store), lookup)),
            Arc::new(certification::CertificationEvaluator::new(Arc::clone(&rule_store))),
            Arc::new(genre::GenreEvaluator::new(Arc::clone(&rule_store))),
        ];
        let leaves = Arc::new(LeafEvaluators::new(leaf_list.clone()));
        let mut evaluators = leaf_list;
        evaluators.push(Arc::new(conditional::ConditionalEvaluator::new(
            rule_store,
            Arc::clone(&leaves),
        )));
        evaluators.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Self {
            evaluators,
            leaves,
        }
    }

    /// Returns the evaluators in priority-descending order.
    #[must_use]
    pub fn evaluators(&self) -> &[Arc<dyn Evaluator>] {
        &self.evaluators
    }

    /// Returns the leaf-capable subset used by the interpreter.
    #[must_use]
    pub const fn leaves(&self) -> &Arc<LeafEvaluators> {
        &self.leaves
    }

    /// Returns per-family metadata for the rule-authoring surface.
    #[must_use]
    pub fn metadata(&self) -> Vec<EvaluatorMetadata> {
        self.evaluators.iter().map(|evaluator| evaluator.metadata()).collect()
    }
}
