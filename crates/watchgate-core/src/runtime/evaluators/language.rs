// crates/watchgate-core/src/runtime/evaluators/language.rs
// ============================================================================
// Module: Language Evaluator
// Description: Original-language matching backed by an external metadata
//              lookup.
// Purpose: Match rule language lists case-insensitively against the
//          lookup-resolved original language.
// Dependencies: crate::core, crate::interfaces, crate::runtime::evaluators
// ============================================================================

//! ## Overview
//! The original language comes from the download manager's lookup endpoint
//! (`originalLanguage.name`), resolved by GUID. Rule existence is checked
//! before the network call; lookup failures are absorbed as "no decision".
//! Condition leaves read only attached metadata, keeping the interpreter
//! pure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::Condition;
use crate::core::ConditionOperator;
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
pub const FIELD_ORIGINAL_LANGUAGE: &str = "original_language";

/// Static evaluation priority for the language family.
pub const PRIORITY: u8 = 70;

/// Returns the field catalog entries this evaluator contributes.
#[must_use]
pub fn field_infos() -> Vec<FieldInfo> {
    vec![FieldInfo {
        field: FIELD_ORIGINAL_LANGUAGE.to_string(),
        operators: vec![
            ConditionOperator::Equals,
            ConditionOperator::NotEquals,
            ConditionOperator::In,
            ConditionOperator::NotIn,
        ],
        description: "Original language name resolved through the lookup endpoint".to_string(),
    }]
}

// ============================================================================
// SECTION: Matching
// ============================================================================

/// Matches a resolved language against candidate names with the operator.
///
/// Comparison is case-insensitive exact match. `Equals`/`In` hold when any
/// candidate matches; `NotEquals`/`NotIn` hold when none do.
#[must_use]
pub fn language_matches(language: &str, candidates: &[&str], operator: ConditionOperator) -> bool {
    let any_match = candidates.iter().any(|candidate| candidate.eq_ignore_ascii_case(language));
    match operator {
        ConditionOperator::Equals | ConditionOperator::In => any_match,
        ConditionOperator::NotEquals | ConditionOperator::NotIn => !any_match,
        ConditionOperator::Contains
        | ConditionOperator::NotContains
        | ConditionOperator::Between
        | ConditionOperator::Regex => false,
    }
}

// ============================================================================
// SECTION: Lookup Resolution
// ============================================================================

/// Resolves a content item's original language through metadata or lookup.
fn resolve_language(
    lookup: Option<&Arc<dyn MetadataLookup>>,
    item: &ContentItem,
    content_type: ContentType,
) -> Option<String> {
    if let Some(metadata) = &item.metadata
        && metadata.original_language.is_some()
    {
        return metadata.original_language.clone();
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
        Ok(found) => found.and_then(|metadata| metadata.original_language),
        Err(err) => {
            tracing::warn!(title = %item.title, error = %err, "language lookup failed");
            None
        }
    }
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Language-family evaluator.
pub struct LanguageEvaluator {
    /// Rule storage collaborator.
    rules: Arc<dyn RuleStore>,
    /// Optional lookup handle for GUID resolution.
    lookup: Option<Arc<dyn MetadataLookup>>,
}

impl LanguageEvaluator {
    /// Creates a language evaluator over the given rule store and lookup.
    #[must_use]
    pub const fn new(rules: Arc<dyn RuleStore>, lookup: Option<Arc<dyn MetadataLookup>>) -> Self {
        Self {
            rules,
            lookup,
        }
    }
}

impl Evaluator for LanguageEvaluator {
    fn family(&self) -> RuleFamily {
        RuleFamily::Language
    }

    fn priority(&self) -> u8 {
        PRIORITY
    }

    fn can_evaluate(&self, item: &ContentItem, ctx: &RoutingContext) -> bool {
        let has_language_source = item
            .metadata
            .as_ref()
            .is_some_and(|metadata| metadata.original_language.is_some())
            || !item.guids.is_empty();
        has_language_source
            && family_has_rules(
                &self.rules,
                RuleFamily::Language,
                TargetService::for_content_type(ctx.content_type),
            )
    }

    fn evaluate(&self, item: &ContentItem, ctx: &RoutingContext) -> Option<Vec<RouteMatch>> {
        let service = TargetService::for_content_type(ctx.content_type);
        // Rule existence is checked before any lookup is attempted.
        let rules = fetch_family_rules(&self.rules, RuleFamily::Language, service);
        if rules.is_empty() {
            return None;
        }
        let language = resolve_language(self.lookup.as_ref(), item, ctx.content_type)?;
        let matches: Vec<RouteMatch> = rules
            .iter()
            .filter(|rule| match &rule.criteria {
                RuleCriteria::Language {
                    languages,
                } => {
                    let candidates: Vec<&str> =
                        languages.iter().map(String::as_str).collect();
                    language_matches(&language, &candidates, ConditionOperator::In)
                }
                _ => {
                    tracing::warn!(
                        rule = %rule.id,
                        "language rule carries foreign criteria; skipped"
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
        if condition.field != FIELD_ORIGINAL_LANGUAGE {
            return false;
        }
        let Some(language) =
            item.metadata.as_ref().and_then(|metadata| metadata.original_language.as_deref())
        else {
            return false;
        };
        let Some(candidates) = condition.value.as_text_values() else {
            return false;
        };
        language_matches(language, &candidates, condition.operator)
    }

    fn can_evaluate_condition_field(&self, field: &str) -> bool {
        field == FIELD_ORIGINAL_LANGUAGE
    }

    fn metadata(&self) -> EvaluatorMetadata {
        EvaluatorMetadata {
            family: RuleFamily::Language,
            description: "Routes content by lookup-resolved original language".to_string(),
            fields: field_infos(),
        }
    }
}
