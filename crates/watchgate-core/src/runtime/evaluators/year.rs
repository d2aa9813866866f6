// crates/watchgate-core/src/runtime/evaluators/year.rs
// ============================================================================
// Module: Year Evaluator
// Description: Release-year matching backed by an external metadata lookup.
// Purpose: Match year criteria (exact, list, inclusive range) against
//          lookup-resolved release years.
// Dependencies: crate::core, crate::interfaces, crate::runtime::evaluators
// ============================================================================

//! ## Overview
//! The release year is not part of the watchlist snapshot; it comes from
//! the download manager's own lookup endpoint, resolved by GUID. The rule
//! existence check runs before the network call so configurations without
//! year rules never pay lookup latency. A lookup failure is absorbed as
//! "no decision" and logged; it never propagates past this evaluator.
//!
//! Condition leaves read only `ContentItem::metadata` (the interpreter is
//! pure); the resolver pre-enriches items when condition trees reference
//! this field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::Condition;
use crate::core::ConditionOperator;
use crate::core::ConditionValue;
use crate::core::ContentItem;
use crate::core::ContentType;
use crate::core::FieldInfo;
use crate::core::RoutingContext;
use crate::core::RuleCriteria;
use crate::core::RuleFamily;
use crate::core::TargetService;
use crate::interfaces::MetadataLookup;
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
pub const FIELD_YEAR: &str = "year";

/// Static evaluation priority for the year family.
pub const PRIORITY: u8 = 60;

/// Returns the field catalog entries this evaluator contributes.
#[must_use]
pub fn field_infos() -> Vec<FieldInfo> {
    vec![FieldInfo {
        field: FIELD_YEAR.to_string(),
        operators: vec![
            ConditionOperator::Equals,
            ConditionOperator::In,
            ConditionOperator::Between,
        ],
        description: "Release year resolved through the lookup endpoint".to_string(),
    }]
}

// ============================================================================
// SECTION: Matching
// ============================================================================

/// Matches a resolved year against a condition value with the operator.
#[must_use]
pub fn year_matches(year: i32, operator: ConditionOperator, value: &ConditionValue) -> bool {
    let year_wide = i64::from(year);
    match operator {
        ConditionOperator::Equals => {
            matches!(value, ConditionValue::Number(expected) if *expected == year_wide)
        }
        ConditionOperator::In => value
            .as_number_values()
            .is_some_and(|values| values.contains(&year_wide)),
        ConditionOperator::Between => {
            matches!(value, ConditionValue::Range(range) if range.contains(year_wide))
        }
        ConditionOperator::NotEquals
        | ConditionOperator::Contains
        | ConditionOperator::NotContains
        | ConditionOperator::NotIn
        | ConditionOperator::Regex => false,
    }
}

// ============================================================================
// SECTION: Lookup Resolution
// ============================================================================

/// Resolves a content item's release year through metadata or lookup.
///
/// Reads attached metadata first; otherwise performs one GUID lookup when a
/// handle is available. Lookup failures are absorbed as `None` with a
/// warning.
fn resolve_year(
    lookup: Option<&Arc<dyn MetadataLookup>>,
    item: &ContentItem,
    content_type: ContentType,
) -> Option<i32> {
    if let Some(metadata) = &item.metadata
        && metadata.year.is_some()
    {
        return metadata.year;
    }
    let lookup = lookup?;
    let metadata = match content_type {
        ContentType::Movie => {
            let tmdb = item.guid_for("tmdb")?.numeric_value()?;
            lookup.movie_by_tmdb(tmdb)
        }
        ContentType::Show => {
            let tvdb = item.guid_for("tvdb")?.numeric_value()?;
            lookup.series_by_tvdb(tvdb)
        }
    };
    match metadata {
        Ok(found) => found.and_then(|metadata| metadata.year),
        Err(err) => {
            tracing::warn!(title = %item.title, error = %err, "year lookup failed");
            None
        }
    }
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Year-family evaluator.
pub struct YearEvaluator {
    /// Rule storage collaborator.
    rules: Arc<dyn RuleStore>,
    /// Optional lookup handle for GUID resolution.
    lookup: Option<Arc<dyn MetadataLookup>>,
}

impl YearEvaluator {
    /// Creates a year evaluator over the given rule store and lookup.
    #[must_use]
    pub const fn new(rules: Arc<dyn RuleStore>, lookup: Option<Arc<dyn MetadataLookup>>) -> Self {
        Self {
            rules,
            lookup,
        }
    }
}

impl Evaluator for YearEvaluator {
    fn family(&self) -> RuleFamily {
        RuleFamily::Year
    }

    fn priority(&self) -> u8 {
        PRIORITY
    }

    fn can_evaluate(&self, item: &ContentItem, ctx: &RoutingContext) -> bool {
        let has_year_source = item.metadata.as_ref().is_some_and(|metadata| metadata.year.is_some())
            || !item.guids.is_empty();
        has_year_source
            && family_has_rules(
                &self.rules,
                RuleFamily::Year,
                TargetService::for_content_type(ctx.content_type),
            )
    }

    fn evaluate(&self, item: &ContentItem, ctx: &RoutingContext) -> Option<Vec<RouteMatch>> {
        let service = TargetService::for_content_type(ctx.content_type);
        // Rule existence is checked before any lookup is attempted.
        let rules = fetch_family_rules(&self.rules, RuleFamily::Year, service);
        if rules.is_empty() {
            return None;
        }
        let year = resolve_year(self.lookup.as_ref(), item, ctx.content_type)?;
        let matches: Vec<RouteMatch> = rules
            .iter()
            .filter(|rule| match &rule.criteria {
                RuleCriteria::Year {
                    year: criterion,
                } => criterion.matches(year),
                _ => {
                    tracing::warn!(rule = %rule.id, "year rule carries foreign criteria; skipped");
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
        if condition.field != FIELD_YEAR {
            return false;
        }
        let Some(year) = item.metadata.as_ref().and_then(|metadata| metadata.year) else {
            return false;
        };
        year_matches(year, condition.operator, &condition.value)
    }

    fn can_evaluate_condition_field(&self, field: &str) -> bool {
        field == FIELD_YEAR
    }

    fn metadata(&self) -> EvaluatorMetadata {
        EvaluatorMetadata {
            family: RuleFamily::Year,
            description: "Routes content by lookup-resolved release year".to_string(),
            fields: field_infos(),
        }
    }
}
