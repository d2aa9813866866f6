// crates/watchgate-core/src/runtime/evaluators/certification.rs
// ============================================================================
// Module: Certification Evaluator
// Description: Certification matching from attached item metadata.
// Purpose: Match certification labels case-insensitively with equality,
//          containment, membership, and guarded regex operators.
// Dependencies: crate::core, crate::runtime::evaluators
// ============================================================================

//! ## Overview
//! Certification is sourced from the item's attached metadata; this family
//! never performs an external call. An item without a certification value
//! matches nothing (fail closed).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::Condition;
use crate::core::ConditionOperator;
use crate::core::ContentItem;
use crate::core::FieldInfo;
use crate::core::RoutingContext;
use crate::core::RuleCriteria;
use crate::core::RuleFamily;
use crate::core::TargetService;
use crate::core::condition::compile_guarded_regex;
use crate::interfaces::RuleStore;
use crate::runtime::evaluators::Evaluator;
use crate::runtime::evaluators::EvaluatorMetadata;
use crate::runtime::evaluators::RouteMatch;
use crate::runtime::evaluators::family_has_rules;
use crate::runtime::evaluators::fetch_family_rules;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Condition field claimed by this evaluator.
pub const FIELD_CERTIFICATION: &str = "certification";

/// Static evaluation priority for the certification family.
pub const PRIORITY: u8 = 50;

/// Returns the field catalog entries this evaluator contributes.
#[must_use]
pub fn field_infos() -> Vec<FieldInfo> {
    vec![FieldInfo {
        field: FIELD_CERTIFICATION.to_string(),
        operators: vec![
            ConditionOperator::Equals,
            ConditionOperator::NotEquals,
            ConditionOperator::Contains,
            ConditionOperator::NotContains,
            ConditionOperator::In,
            ConditionOperator::NotIn,
            ConditionOperator::Regex,
        ],
        description: "Certification label from item metadata".to_string(),
    }]
}

// ============================================================================
// SECTION: Matching
// ============================================================================

/// Matches a certification label against candidate values with the
/// operator.
///
/// All comparisons are case-insensitive. `Equals`/`In` mean exact
/// membership; `Contains` means any candidate appears as a substring of
/// the label; `Regex` matches the first candidate as a guarded pattern.
#[must_use]
pub fn certification_matches(
    certification: &str,
    candidates: &[&str],
    operator: ConditionOperator,
) -> bool {
    let label = certification.trim().to_lowercase();
    let exact = candidates.iter().any(|candidate| candidate.trim().to_lowercase() == label);
    match operator {
        ConditionOperator::Equals | ConditionOperator::In => exact,
        ConditionOperator::NotEquals | ConditionOperator::NotIn => !exact,
        ConditionOperator::Contains => candidates
            .iter()
            .any(|candidate| label.contains(&candidate.trim().to_lowercase())),
        ConditionOperator::NotContains => !candidates
            .iter()
            .any(|candidate| label.contains(&candidate.trim().to_lowercase())),
        ConditionOperator::Regex => match candidates.first() {
            Some(pattern) => match compile_guarded_regex(pattern) {
                Ok(regex) => regex.is_match(&label),
                Err(reason) => {
                    tracing::warn!(reason = %reason, "certification regex rejected");
                    false
                }
            },
            None => false,
        },
        ConditionOperator::Between => false,
    }
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Certification-family evaluator.
pub struct CertificationEvaluator {
    /// Rule storage collaborator.
    rules: Arc<dyn RuleStore>,
}

impl CertificationEvaluator {
    /// Creates a certification evaluator over the given rule store.
    #[must_use]
    pub const fn new(rules: Arc<dyn RuleStore>) -> Self {
        Self {
            rules,
        }
    }

    /// Returns the item's certification label, if attached.
    fn certification_of(item: &ContentItem) -> Option<&str> {
        item.metadata.as_ref().and_then(|metadata| metadata.certification.as_deref())
    }
}

impl Evaluator for CertificationEvaluator {
    fn family(&self) -> RuleFamily {
        RuleFamily::Certification
    }

    fn priority(&self) -> u8 {
        PRIORITY
    }

    fn can_evaluate(&self, item: &ContentItem, ctx: &RoutingContext) -> bool {
        Self::certification_of(item).is_some()
            && family_has_rules(
                &self.rules,
                RuleFamily::Certification,
                TargetService::for_content_type(ctx.content_type),
            )
    }

    fn evaluate(&self, item: &ContentItem, ctx: &RoutingContext) -> Option<Vec<RouteMatch>> {
        let certification = Self::certification_of(item)?;
        let service = TargetService::for_content_type(ctx.content_type);
        let rules = fetch_family_rules(&self.rules, RuleFamily::Certification, service);
        let matches: Vec<RouteMatch> = rules
            .iter()
            .filter(|rule| match &rule.criteria {
                RuleCriteria::Certification {
                    values,
                    operator,
                } => {
                    let candidates: Vec<&str> = values.iter().map(String::as_str).collect();
                    certification_matches(certification, &candidates, *operator)
                }
                _ => {
                    tracing::warn!(
                        rule = %rule.id,
                        "certification rule carries foreign criteria; skipped"
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
        condition: &Condition,
        item: &ContentItem,
        _ctx: &RoutingContext,
    ) -> bool {
        if condition.field != FIELD_CERTIFICATION {
            return false;
        }
        let Some(certification) = Self::certification_of(item) else {
            return false;
        };
        let Some(candidates) = condition.value.as_text_values() else {
            return false;
        };
        certification_matches(certification, &candidates, condition.operator)
    }

    fn can_evaluate_condition_field(&self, field: &str) -> bool {
        field == FIELD_CERTIFICATION
    }

    fn metadata(&self) -> EvaluatorMetadata {
        EvaluatorMetadata {
            family: RuleFamily::Certification,
            description: "Routes content by certification label".to_string(),
            fields: field_infos(),
        }
    }
}
