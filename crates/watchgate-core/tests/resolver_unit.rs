// crates/watchgate-core/tests/resolver_unit.rs
// ============================================================================
// Module: Resolver Unit Tests
// Description: Aggregation, conflict resolution, fallback, fan-out, and
//              forced-approval assembly.
// Purpose: Validate the resolver's deterministic decision set.
// Dependencies: watchgate-core
// ============================================================================

//! Resolver behavior: priority conflicts per instance, tie-breaking,
//! multi-instance fan-out, default-instance fallback, instance validation,
//! rule-forced approval, and determinism.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::sync::Arc;

use common::draft;
use common::genre_draft;
use common::instance;
use common::movie_ctx;
use common::movie_item;
use watchgate_core::ApprovalTrigger;
use watchgate_core::BooleanOperator;
use watchgate_core::Condition;
use watchgate_core::ConditionGroup;
use watchgate_core::ConditionNode;
use watchgate_core::ConditionOperator;
use watchgate_core::ConditionValue;
use watchgate_core::InstanceConfig;
use watchgate_core::RouterDecision;
use watchgate_core::RuleCriteria;
use watchgate_core::TargetService;
use watchgate_core::interfaces::InstanceRegistry;
use watchgate_core::interfaces::RuleStore;
use watchgate_core::runtime::DecisionResolver;
use watchgate_core::runtime::InMemoryStores;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn stores() -> Arc<InMemoryStores> {
    let stores = Arc::new(InMemoryStores::new());
    stores.insert_instance(instance(1, TargetService::Radarr, true));
    stores.insert_instance(instance(2, TargetService::Radarr, false));
    stores
}

fn resolver(stores: &Arc<InMemoryStores>) -> DecisionResolver {
    let rules: Arc<dyn RuleStore> = stores.clone();
    let instances: Arc<dyn InstanceRegistry> = stores.clone();
    DecisionResolver::new(rules, instances, None)
}

fn route_instances(decisions: &[RouterDecision]) -> Vec<u64> {
    decisions
        .iter()
        .filter_map(RouterDecision::routing)
        .map(|routing| routing.instance_id.get())
        .collect()
}

// ============================================================================
// SECTION: Priority Conflicts
// ============================================================================

#[test]
fn higher_priority_rule_wins_the_instance_configuration() {
    let stores = stores();
    let mut low = genre_draft("low", 1, 10, &["Horror"]);
    low.quality_profile = Some("SD".to_string());
    let mut high = genre_draft("high", 1, 90, &["Horror"]);
    high.quality_profile = Some("HD-1080p".to_string());
    stores.save_rule(low).expect("save rule");
    stores.save_rule(high).expect("save rule");

    let resolution = resolver(&stores)
        .resolve(&movie_item("Scream Again", &["Horror"]), &movie_ctx(1))
        .expect("resolution");

    assert_eq!(resolution.decisions.len(), 1);
    let routing = resolution.decisions[0].routing().expect("route decision");
    assert_eq!(routing.quality_profile.as_deref(), Some("HD-1080p"));
    assert_eq!(routing.weight, 90);
}

#[test]
fn equal_priority_conflict_breaks_on_lower_rule_id() {
    let stores = stores();
    let mut first = genre_draft("first", 1, 50, &["Horror"]);
    first.quality_profile = Some("First".to_string());
    let mut second = genre_draft("second", 1, 50, &["Horror"]);
    second.quality_profile = Some("Second".to_string());
    let first = stores.save_rule(first).expect("save rule");
    stores.save_rule(second).expect("save rule");

    let resolution = resolver(&stores)
        .resolve(&movie_item("Scream Again", &["Horror"]), &movie_ctx(1))
        .expect("resolution");

    let routing = resolution.decisions[0].routing().expect("route decision");
    assert_eq!(routing.rule_id, Some(first.id));
    assert_eq!(routing.quality_profile.as_deref(), Some("First"));
}

// ============================================================================
// SECTION: Fan-Out
// ============================================================================

#[test]
fn conditional_and_genre_rules_fan_out_to_two_instances() {
    let stores = stores();
    stores.save_rule(genre_draft("genre-route", 1, 10, &["Horror"])).expect("save rule");
    let tree = ConditionNode::Group(ConditionGroup {
        operator: BooleanOperator::And,
        conditions: vec![ConditionNode::Leaf(Condition {
            field: "genre".to_string(),
            operator: ConditionOperator::In,
            value: ConditionValue::TextList(vec!["Horror".to_string()]),
            negate: false,
        })],
        negate: false,
    });
    stores
        .save_rule(draft(
            "tree-route",
            2,
            20,
            RuleCriteria::Condition {
                root: tree,
            },
        ))
        .expect("save rule");

    let resolution = resolver(&stores)
        .resolve(&movie_item("Scream Again", &["Horror"]), &movie_ctx(1))
        .expect("resolution");

    assert_eq!(resolution.decisions.len(), 2);
    // Deterministic order: weight descending.
    assert_eq!(route_instances(&resolution.decisions), vec![2, 1]);
}

#[test]
fn repeated_resolution_yields_an_identical_decision_set() {
    let stores = stores();
    stores.save_rule(genre_draft("a", 1, 10, &["Horror"])).expect("save rule");
    stores.save_rule(genre_draft("b", 2, 20, &["Horror"])).expect("save rule");
    let resolver = resolver(&stores);
    let item = movie_item("Scream Again", &["Horror"]);
    let ctx = movie_ctx(1);

    let first = resolver.resolve(&item, &ctx).expect("resolution");
    for _ in 0 .. 16 {
        let again = resolver.resolve(&item, &ctx).expect("resolution");
        assert_eq!(again.decisions, first.decisions);
    }
}

// ============================================================================
// SECTION: Fallback and Validation
// ============================================================================

#[test]
fn no_matching_rule_falls_back_to_the_default_instance() {
    let stores = stores();
    stores.save_rule(genre_draft("horror-only", 2, 10, &["Horror"])).expect("save rule");

    let resolution = resolver(&stores)
        .resolve(&movie_item("Romcom", &["Romance"]), &movie_ctx(1))
        .expect("resolution");

    assert_eq!(resolution.decisions.len(), 1);
    let routing = resolution.decisions[0].routing().expect("route decision");
    assert_eq!(routing.instance_id.get(), 1);
    assert_eq!(routing.rule_id, None);
    assert_eq!(routing.weight, 0);
    // Fallback carries the instance's own stored configuration.
    assert_eq!(routing.quality_profile.as_deref(), Some("Any"));
}

#[test]
fn decisions_targeting_disabled_instances_are_dropped() {
    let stores = stores();
    let mut disabled = instance(3, TargetService::Radarr, false);
    disabled.enabled = false;
    stores.insert_instance(disabled);
    stores.save_rule(genre_draft("to-disabled", 3, 40, &["Horror"])).expect("save rule");

    let resolution = resolver(&stores)
        .resolve(&movie_item("Scream Again", &["Horror"]), &movie_ctx(1))
        .expect("resolution");

    // The only match targeted a disabled instance; fallback applies.
    assert_eq!(route_instances(&resolution.decisions), vec![1]);
}

#[test]
fn no_rules_and_no_default_yields_an_empty_resolution() {
    let stores = Arc::new(InMemoryStores::new());
    let no_default = InstanceConfig {
        is_default: false,
        ..instance(1, TargetService::Radarr, false)
    };
    stores.insert_instance(no_default);

    let resolution = resolver(&stores)
        .resolve(&movie_item("Unrouted", &["Drama"]), &movie_ctx(1))
        .expect("resolution");

    assert!(resolution.is_empty());
}

// ============================================================================
// SECTION: Forced Approval
// ============================================================================

#[test]
fn rule_forced_approval_collapses_the_set_into_one_verdict() {
    let stores = stores();
    stores.save_rule(genre_draft("plain", 1, 10, &["Horror"])).expect("save rule");
    let mut forced = genre_draft("forced", 2, 20, &["Horror"]);
    forced.require_approval = true;
    forced.approval_reason = Some("horror needs sign-off".to_string());
    let forced = stores.save_rule(forced).expect("save rule");

    let resolution = resolver(&stores)
        .resolve(&movie_item("Scream Again", &["Horror"]), &movie_ctx(1))
        .expect("resolution");

    assert_eq!(resolution.decisions.len(), 1);
    let approval = resolution.decisions[0].approval().expect("approval verdict");
    assert_eq!(approval.triggered_by, ApprovalTrigger::RouterRule);
    assert_eq!(approval.reason, "horror needs sign-off");
    assert_eq!(approval.router_rule_id, Some(forced.id));
    // Fan-out is preserved inside the proposed routing set.
    assert_eq!(approval.proposed_routing.len(), 2);
}

#[test]
fn forced_approval_from_a_conditional_rule_reports_content_criteria() {
    let stores = stores();
    let tree = ConditionNode::Leaf(Condition {
        field: "genre".to_string(),
        operator: ConditionOperator::In,
        value: ConditionValue::TextList(vec!["Horror".to_string()]),
        negate: false,
    });
    let mut forced = draft(
        "tree-forced",
        1,
        30,
        RuleCriteria::Condition {
            root: tree,
        },
    );
    forced.require_approval = true;
    stores.save_rule(forced).expect("save rule");

    let resolution = resolver(&stores)
        .resolve(&movie_item("Scream Again", &["Horror"]), &movie_ctx(1))
        .expect("resolution");

    let approval = resolution.decisions[0].approval().expect("approval verdict");
    assert_eq!(approval.triggered_by, ApprovalTrigger::ContentCriteria);
}
