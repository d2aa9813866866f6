// crates/watchgate-core/src/runtime/evaluators/genre.rs
// ============================================================================
// Module: Genre Evaluator
// Description: Genre set matching for router rules and condition leaves.
// Purpose: Match case/whitespace-normalized genre sets with containment,
//          equality, and guarded regex operators.
// Dependencies: crate::core, crate::runtime::evaluators
// ============================================================================

//! ## Overview
//! Genres are normalized (trimmed, lowercased) before comparison so
//! provider casing differences never affect matching. The regex operator
//! runs under the shared pattern guard; rejected patterns are treated as a
//! non-match instead of evaluated.

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
pub const FIELD_GENRE: &str = "genre";

/// Static evaluation priority for the genre family.
pub const PRIORITY: u8 = 40;

/// Returns the field catalog entries this evaluator contributes.
#[must_use]
pub fn field_infos() -> Vec<FieldInfo> {
    vec![FieldInfo {
        field: FIELD_GENRE.to_string(),
        operators: vec![
            ConditionOperator::Contains,
            ConditionOperator::NotContains,
            ConditionOperator::In,
            ConditionOperator::NotIn,
            ConditionOperator::Equals,
            ConditionOperator::Regex,
        ],
        description: "Watchlist genre labels, normalized before comparison".to_string(),
    }]
}

// ============================================================================
// SECTION: Matching
// ============================================================================

/// Normalizes a genre label for comparison.
fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Normalizes a set of genre labels, dropping empties.
fn normalize_set(labels: &[String]) -> Vec<String> {
    let mut set = Vec::with_capacity(labels.len());
    for label in labels {
        let normalized = normalize(label);
        if !normalized.is_empty() && !set.contains(&normalized) {
            set.push(normalized);
        }
    }
    set
}

/// Matches an item's genres against criterion genres with the operator.
///
/// `Contains`/`In` mean any overlap; `NotContains`/`NotIn` mean no overlap;
/// `Equals` means exact set equality; `Regex` means any item genre matches
/// the pattern. Other operators do not apply to genres and match nothing.
#[must_use]
pub fn genres_match(
    item_genres: &[String],
    criterion: &[String],
    operator: ConditionOperator,
) -> bool {
    let item_set = normalize_set(item_genres);
    let wanted = normalize_set(criterion);
    match operator {
        ConditionOperator::Contains | ConditionOperator::In => {
            wanted.iter().any(|genre| item_set.contains(genre))
        }
        ConditionOperator::NotContains | ConditionOperator::NotIn => {
            !wanted.iter().any(|genre| item_set.contains(genre))
        }
        ConditionOperator::Equals => {
            let mut left = item_set;
            let mut right = wanted;
            left.sort_unstable();
            right.sort_unstable();
            left == right
        }
        ConditionOperator::Regex => match criterion.first() {
            Some(pattern) => match compile_guarded_regex(pattern) {
                Ok(regex) => item_set.iter().any(|genre| regex.is_match(genre)),
                Err(reason) => {
                    tracing::warn!(reason = %reason, "genre regex rejected");
                    false
                }
            },
            None => false,
        },
        ConditionOperator::NotEquals | ConditionOperator::Between => false,
    }
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Genre-family evaluator.
pub struct GenreEvaluator {
    /// Rule storage collaborator.
    rules: Arc<dyn RuleStore>,
}

impl GenreEvaluator {
    /// Creates a genre evaluator over the given rule store.
    #[must_use]
    pub const fn new(rules: Arc<dyn RuleStore>) -> Self {
        Self {
            rules,
        }
    }
}

impl Evaluator for GenreEvaluator {
    fn family(&self) -> RuleFamily {
        RuleFamily::Genre
    }

    fn priority(&self) -> u8 {
        PRIORITY
    }

    fn can_evaluate(&self, item: &ContentItem, ctx: &RoutingContext) -> bool {
        !item.genres.is_empty()
            && family_has_rules(
                &self.rules,
                RuleFamily::Genre,
                TargetService::for_content_type(ctx.content_type),
            )
    }

    fn evaluate(&self, item: &ContentItem, ctx: &RoutingContext) -> Option<Vec<RouteMatch>> {
        let service = TargetService::for_content_type(ctx.content_type);
        let rules = fetch_family_rules(&self.rules, RuleFamily::Genre, service);
        let matches: Vec<RouteMatch> = rules
            .iter()
            .filter(|rule| match &rule.criteria {
                RuleCriteria::Genre {
                    genres,
                    operator,
                } => genres_match(&item.genres, genres, *operator),
                _ => {
                    tracing::warn!(rule = %rule.id, "genre rule carries foreign criteria; skipped");
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
        if condition.field != FIELD_GENRE {
            return false;
        }
        let Some(values) = condition.value.as_text_values() else {
            return false;
        };
        let wanted: Vec<String> = values.iter().map(ToString::to_string).collect();
        genres_match(&item.genres, &wanted, condition.operator)
    }

    fn can_evaluate_condition_field(&self, field: &str) -> bool {
        field == FIELD_GENRE
    }

    fn metadata(&self) -> EvaluatorMetadata {
        EvaluatorMetadata {
            family: RuleFamily::Genre,
            description: "Routes content by watchlist genre labels".to_string(),
            fields: field_infos(),
        }
    }
}
