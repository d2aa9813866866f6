// crates/watchgate-core/src/runtime/evaluators/user.rs
// ============================================================================
// Module: User Evaluator
// Description: Requesting-user matching for router rules and condition
//              leaves.
// Purpose: Match numeric user ids or usernames against rule criteria,
//          supporting multi-user attribution.
// Dependencies: crate::core, crate::runtime::evaluators
// ============================================================================

//! ## Overview
//! Watchlist items can carry several attributed users (group attribution);
//! a rule matches when any attributed id or name satisfies the criterion.
//! Items without attribution match nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::Condition;
use crate::core::ConditionOperator;
use crate::core::ConditionValue;
use crate::core::ContentItem;
use crate::core::FieldInfo;
use crate::core::RoutingContext;
use crate::core::RuleCriteria;
use crate::core::RuleFamily;
use crate::core::TargetService;
use crate::core::UserCriterion;
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
pub const FIELD_USER: &str = "user";

/// Static evaluation priority for the user family.
pub const PRIORITY: u8 = 80;

/// Returns the field catalog entries this evaluator contributes.
#[must_use]
pub fn field_infos() -> Vec<FieldInfo> {
    vec![FieldInfo {
        field: FIELD_USER.to_string(),
        operators: vec![
            ConditionOperator::Equals,
            ConditionOperator::In,
            ConditionOperator::NotIn,
        ],
        description: "Requesting user id or username, any attribution matches".to_string(),
    }]
}

// ============================================================================
// SECTION: Matching
// ============================================================================

/// Returns true when any attributed user satisfies the criterion.
#[must_use]
pub fn users_match(ctx: &RoutingContext, criterion: &UserCriterion) -> bool {
    ctx.users.iter().any(|user| {
        user.id.is_some_and(|id| criterion.ids.contains(&id))
            || user
                .name
                .as_deref()
                .is_some_and(|name| criterion.names.iter().any(|wanted| wanted == name))
    })
}

/// Builds a criterion from a condition value (numbers are ids, strings are
/// usernames).
fn criterion_from_value(value: &ConditionValue) -> UserCriterion {
    let mut criterion = UserCriterion::default();
    if let Some(numbers) = value.as_number_values() {
        criterion.ids = numbers
            .into_iter()
            .filter_map(|raw| u64::try_from(raw).ok())
            .filter_map(crate::core::UserId::from_raw)
            .collect();
    }
    if let Some(names) = value.as_text_values() {
        criterion.names = names.iter().map(ToString::to_string).collect();
    }
    criterion
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// User-family evaluator.
pub struct UserEvaluator {
    /// Rule storage collaborator.
    rules: Arc<dyn RuleStore>,
}

impl UserEvaluator {
    /// Creates a user evaluator over the given rule store.
    #[must_use]
    pub const fn new(rules: Arc<dyn RuleStore>) -> Self {
        Self {
            rules,
        }
    }
}

impl Evaluator for UserEvaluator {
    fn family(&self) -> RuleFamily {
        RuleFamily::User
    }

    fn priority(&self) -> u8 {
        PRIORITY
    }

    fn can_evaluate(&self, _item: &ContentItem, ctx: &RoutingContext) -> bool {
        !ctx.users.is_empty()
            && family_has_rules(
                &self.rules,
                RuleFamily::User,
                TargetService::for_content_type(ctx.content_type),
            )
    }

    fn evaluate(&self, _item: &ContentItem, ctx: &RoutingContext) -> Option<Vec<RouteMatch>> {
        if ctx.users.is_empty() {
            return None;
        }
        let service = TargetService::for_content_type(ctx.content_type);
        let rules = fetch_family_rules(&self.rules, RuleFamily::User, service);
        let matches: Vec<RouteMatch> = rules
            .iter()
            .filter(|rule| match &rule.criteria {
                RuleCriteria::User {
                    users,
                } => users_match(ctx, users),
                _ => {
                    tracing::warn!(rule = %rule.id, "user rule carries foreign criteria; skipped");
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
        _item: &ContentItem,
        ctx: &RoutingContext,
    ) -> bool {
        if condition.field != FIELD_USER {
            return false;
        }
        let criterion = criterion_from_value(&condition.value);
        let matched = users_match(ctx, &criterion);
        match condition.operator {
            ConditionOperator::Equals | ConditionOperator::In => matched,
            ConditionOperator::NotIn => !matched,
            ConditionOperator::NotEquals
            | ConditionOperator::Contains
            | ConditionOperator::NotContains
            | ConditionOperator::Between
            | ConditionOperator::Regex => false,
        }
    }

    fn can_evaluate_condition_field(&self, field: &str) -> bool {
        field == FIELD_USER
    }

    fn metadata(&self) -> EvaluatorMetadata {
        EvaluatorMetadata {
            family: RuleFamily::User,
            description: "Routes content by requesting user".to_string(),
            fields: field_infos(),
        }
    }
}
