// crates/watchgate-core/tests/evaluator_unit.rs
// ============================================================================
// Module: Evaluator Unit Tests
// Description: Family-specific matching, preconditions, and failure
//              absorption.
// Purpose: Validate each rule family against real rule storage and stubbed
//          lookups.
// Dependencies: watchgate-core
// ============================================================================

//! Family evaluator tests: genre set semantics, year ranges, language and
//! certification comparison, user attribution, and store-failure behavior.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::sync::Arc;

use common::FailingRuleStore;
use common::StubLookup;
use common::as_lookup;
use common::draft;
use common::genre_draft;
use common::instance;
use common::movie_ctx;
use common::movie_item;
use common::movie_item_with_metadata;
use common::user_id;
use watchgate_core::ConditionOperator;
use watchgate_core::ContentMetadata;
use watchgate_core::NumberRange;
use watchgate_core::RuleCriteria;
use watchgate_core::TargetService;
use watchgate_core::UserAttribution;
use watchgate_core::UserCriterion;
use watchgate_core::YearCriterion;
use watchgate_core::interfaces::RuleStore;
use watchgate_core::runtime::InMemoryStores;
use watchgate_core::runtime::evaluators::Evaluator;
use watchgate_core::runtime::evaluators::certification::CertificationEvaluator;
use watchgate_core::runtime::evaluators::genre::GenreEvaluator;
use watchgate_core::runtime::evaluators::genre::genres_match;
use watchgate_core::runtime::evaluators::language::LanguageEvaluator;
use watchgate_core::runtime::evaluators::user::UserEvaluator;
use watchgate_core::runtime::evaluators::year::YearEvaluator;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds stores with one enabled Radarr instance.
fn stores_with_instance() -> Arc<InMemoryStores> {
    let stores = Arc::new(InMemoryStores::new());
    stores.insert_instance(instance(1, TargetService::Radarr, true));
    stores.insert_instance(instance(2, TargetService::Radarr, false));
    stores
}

// ============================================================================
// SECTION: Genre Matching
// ============================================================================

#[test]
fn genre_overlap_is_case_and_whitespace_normalized() {
    assert!(genres_match(
        &[" Science Fiction ".to_string()],
        &["science fiction".to_string()],
        ConditionOperator::In,
    ));
    assert!(!genres_match(
        &["Comedy".to_string()],
        &["Horror".to_string()],
        ConditionOperator::In,
    ));
}

#[test]
fn genre_equals_requires_exact_set_equality() {
    assert!(genres_match(
        &["Action".to_string(), "Comedy".to_string()],
        &["comedy".to_string(), "action".to_string()],
        ConditionOperator::Equals,
    ));
    assert!(!genres_match(
        &["Action".to_string(), "Comedy".to_string()],
        &["action".to_string()],
        ConditionOperator::Equals,
    ));
}

#[test]
fn genre_not_in_means_no_overlap() {
    assert!(genres_match(
        &["Drama".to_string()],
        &["Horror".to_string()],
        ConditionOperator::NotIn,
    ));
    assert!(!genres_match(
        &["Drama".to_string(), "Horror".to_string()],
        &["Horror".to_string()],
        ConditionOperator::NotIn,
    ));
}

#[test]
fn genre_regex_matches_any_genre() {
    assert!(genres_match(
        &["Science Fiction".to_string()],
        &["^science".to_string()],
        ConditionOperator::Regex,
    ));
}

#[test]
fn oversized_regex_pattern_is_rejected_not_evaluated() {
    let oversized = "a".repeat(1024);
    assert!(!genres_match(
        &["aaaa".to_string()],
        &[oversized],
        ConditionOperator::Regex,
    ));
}

#[test]
fn genre_evaluator_returns_one_decision_per_matching_rule() {
    let stores = stores_with_instance();
    stores.save_rule(genre_draft("horror", 1, 10, &["Horror"])).expect("save rule");
    stores.save_rule(genre_draft("scary", 2, 20, &["Horror", "Thriller"])).expect("save rule");
    stores.save_rule(genre_draft("comedy", 1, 30, &["Comedy"])).expect("save rule");

    let evaluator = GenreEvaluator::new(stores);
    let item = movie_item("Scream Again", &["Horror"]);
    let ctx = movie_ctx(1);

    assert!(evaluator.can_evaluate(&item, &ctx));
    let matches = evaluator.evaluate(&item, &ctx).expect("matches");
    assert_eq!(matches.len(), 2);
}

#[test]
fn genre_evaluator_absorbs_store_failure_as_no_rules() {
    let evaluator = GenreEvaluator::new(Arc::new(FailingRuleStore));
    let item = movie_item("Scream Again", &["Horror"]);
    let ctx = movie_ctx(1);

    assert!(!evaluator.can_evaluate(&item, &ctx));
    assert!(evaluator.evaluate(&item, &ctx).is_none());
}

// ============================================================================
// SECTION: Year Matching
// ============================================================================

#[test]
fn year_range_is_boundary_inclusive() {
    let criterion = YearCriterion::Range(NumberRange {
        min: Some(2000),
        max: Some(2009),
    });
    assert!(criterion.matches(2000));
    assert!(criterion.matches(2005));
    assert!(criterion.matches(2009));
    assert!(!criterion.matches(1999));
    assert!(!criterion.matches(2010));
}

#[test]
fn open_year_bounds_default_to_infinity() {
    let no_min = YearCriterion::Range(NumberRange {
        min: None,
        max: Some(1980),
    });
    assert!(no_min.matches(1920));
    assert!(!no_min.matches(1981));
}

#[test]
fn year_evaluator_skips_lookup_when_no_year_rules_exist() {
    let stores = stores_with_instance();
    let lookup = StubLookup::serving(ContentMetadata {
        year: Some(2005),
        original_language: None,
        certification: None,
    });
    let evaluator = YearEvaluator::new(stores, Some(as_lookup(&lookup)));
    let item = movie_item("Old Film", &[]);
    let ctx = movie_ctx(1);

    assert!(evaluator.evaluate(&item, &ctx).is_none());
    assert_eq!(lookup.call_count(), 0);
}

#[test]
fn year_evaluator_resolves_through_lookup_when_rules_exist() {
    let stores = stores_with_instance();
    stores
        .save_rule(draft(
            "noughties",
            1,
            10,
            RuleCriteria::Year {
                year: YearCriterion::Range(NumberRange {
                    min: Some(2000),
                    max: Some(2009),
                }),
            },
        ))
        .expect("save rule");
    let lookup = StubLookup::serving(ContentMetadata {
        year: Some(2005),
        original_language: None,
        certification: None,
    });
    let evaluator = YearEvaluator::new(stores, Some(as_lookup(&lookup)));
    let item = movie_item("Mid Decade", &[]);
    let ctx = movie_ctx(1);

    let matches = evaluator.evaluate(&item, &ctx).expect("matches");
    assert_eq!(matches.len(), 1);
    assert_eq!(lookup.call_count(), 1);
}

#[test]
fn year_evaluator_absorbs_lookup_failure_as_no_decision() {
    let stores = stores_with_instance();
    stores
        .save_rule(draft(
            "exact",
            1,
            10,
            RuleCriteria::Year {
                year: YearCriterion::Exact(1999),
            },
        ))
        .expect("save rule");
    let failing = StubLookup::failing();
    let evaluator = YearEvaluator::new(stores, Some(as_lookup(&failing)));
    let item = movie_item("Unknown Year", &[]);
    let ctx = movie_ctx(1);

    assert!(evaluator.evaluate(&item, &ctx).is_none());
}

#[test]
fn year_evaluator_prefers_attached_metadata_over_lookup() {
    let stores = stores_with_instance();
    stores
        .save_rule(draft(
            "exact",
            1,
            10,
            RuleCriteria::Year {
                year: YearCriterion::Exact(1994),
            },
        ))
        .expect("save rule");
    let lookup = StubLookup::serving(ContentMetadata {
        year: Some(2005),
        original_language: None,
        certification: None,
    });
    let evaluator = YearEvaluator::new(stores, Some(as_lookup(&lookup)));
    let item = movie_item_with_metadata(
        "Classic",
        &[],
        ContentMetadata {
            year: Some(1994),
            original_language: None,
            certification: None,
        },
    );
    let ctx = movie_ctx(1);

    let matches = evaluator.evaluate(&item, &ctx).expect("matches");
    assert_eq!(matches.len(), 1);
    assert_eq!(lookup.call_count(), 0);
}

// ============================================================================
// SECTION: Language Matching
// ============================================================================

#[test]
fn language_match_is_case_insensitive() {
    let stores = stores_with_instance();
    stores
        .save_rule(draft(
            "anime-language",
            1,
            10,
            RuleCriteria::Language {
                languages: vec!["japanese".to_string()],
            },
        ))
        .expect("save rule");
    let lookup = StubLookup::serving(ContentMetadata {
        year: None,
        original_language: Some("Japanese".to_string()),
        certification: None,
    });
    let evaluator = LanguageEvaluator::new(stores, Some(as_lookup(&lookup)));
    let item = movie_item("Imported", &[]);
    let ctx = movie_ctx(1);

    let matches = evaluator.evaluate(&item, &ctx).expect("matches");
    assert_eq!(matches.len(), 1);
}

// ============================================================================
// SECTION: Certification Matching
// ============================================================================

#[test]
fn certification_matches_from_item_metadata_without_lookup() {
    let stores = stores_with_instance();
    stores
        .save_rule(draft(
            "mature",
            1,
            10,
            RuleCriteria::Certification {
                values: vec!["r".to_string(), "nc-17".to_string()],
                operator: ConditionOperator::In,
            },
        ))
        .expect("save rule");
    let evaluator = CertificationEvaluator::new(stores);
    let item = movie_item_with_metadata(
        "Gritty",
        &[],
        ContentMetadata {
            year: None,
            original_language: None,
            certification: Some("R".to_string()),
        },
    );
    let ctx = movie_ctx(1);

    assert!(evaluator.can_evaluate(&item, &ctx));
    let matches = evaluator.evaluate(&item, &ctx).expect("matches");
    assert_eq!(matches.len(), 1);
}

#[test]
fn certification_evaluator_skips_items_without_metadata() {
    let stores = stores_with_instance();
    stores
        .save_rule(draft(
            "mature",
            1,
            10,
            RuleCriteria::Certification {
                values: vec!["R".to_string()],
                operator: ConditionOperator::In,
            },
        ))
        .expect("save rule");
    let evaluator = CertificationEvaluator::new(stores);
    let item = movie_item("Unrated", &[]);
    let ctx = movie_ctx(1);

    assert!(!evaluator.can_evaluate(&item, &ctx));
    assert!(evaluator.evaluate(&item, &ctx).is_none());
}

// ============================================================================
// SECTION: User Matching
// ============================================================================

#[test]
fn user_rule_matches_any_attribution_in_a_group() {
    let stores = stores_with_instance();
    stores
        .save_rule(draft(
            "power-user",
            1,
            10,
            RuleCriteria::User {
                users: UserCriterion {
                    ids: vec![user_id(42)],
                    names: Vec::new(),
                },
            },
        ))
        .expect("save rule");
    let evaluator = UserEvaluator::new(stores);
    let item = movie_item("Shared Pick", &[]);
    let mut ctx = movie_ctx(7);
    ctx.users.push(UserAttribution::from_id(user_id(42)));

    let matches = evaluator.evaluate(&item, &ctx).expect("matches");
    assert_eq!(matches.len(), 1);
}

#[test]
fn user_rule_matches_by_name() {
    let stores = stores_with_instance();
    stores
        .save_rule(draft(
            "named",
            1,
            10,
            RuleCriteria::User {
                users: UserCriterion {
                    ids: Vec::new(),
                    names: vec!["alex".to_string()],
                },
            },
        ))
        .expect("save rule");
    let evaluator = UserEvaluator::new(stores);
    let item = movie_item("Named Pick", &[]);
    let mut ctx = movie_ctx(7);
    ctx.users.push(UserAttribution::from_name("alex"));

    let matches = evaluator.evaluate(&item, &ctx).expect("matches");
    assert_eq!(matches.len(), 1);
}

#[test]
fn user_evaluator_requires_attribution() {
    let stores = stores_with_instance();
    stores
        .save_rule(draft(
            "anyone",
            1,
            10,
            RuleCriteria::User {
                users: UserCriterion {
                    ids: vec![user_id(42)],
                    names: Vec::new(),
                },
            },
        ))
        .expect("save rule");
    let evaluator = UserEvaluator::new(stores);
    let item = movie_item("Orphan Pick", &[]);
    let ctx = common::anonymous_movie_ctx();

    assert!(!evaluator.can_evaluate(&item, &ctx));
    assert!(evaluator.evaluate(&item, &ctx).is_none());
}
