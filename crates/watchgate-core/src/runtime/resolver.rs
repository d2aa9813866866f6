// crates/watchgate-core/src/runtime/resolver.rs
// ============================================================================
// Module: Decision Resolver
// Description: Priority-ordered evaluator orchestration and decision
//              aggregation.
// Purpose: Produce the final routing decision set for one content item,
//          deterministic regardless of evaluator completion order.
// Dependencies: crate::core, crate::interfaces, crate::runtime::evaluators
// ============================================================================

//! ## Overview
//! The resolver runs every registered evaluator in descending priority
//! order and collects all results before resolving conflicts; it never
//! resolves incrementally, so merging stays deterministic even if families
//! evaluate in parallel. Matching is a union across families: content may
//! legitimately fan out to several instances. When two rules target the
//! same instance, the higher-priority rule wins that instance's
//! configuration, ties breaking on the lower rule id.
//!
//! Rule-forced approvals collapse the routing set into a single
//! require-approval verdict carrying the full proposed routing, preserving
//! fan-out across the approval boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use crate::core::ApprovalContext;
use crate::core::ApprovalTrigger;
use crate::core::ContentItem;
use crate::core::ContentType;
use crate::core::InstanceConfig;
use crate::core::InstanceId;
use crate::core::RouterDecision;
use crate::core::RoutingContext;
use crate::core::RoutingDecision;
use crate::core::RuleFamily;
use crate::core::TargetService;
use crate::interfaces::InstanceRegistry;
use crate::interfaces::InstanceRegistryError;
use crate::interfaces::MetadataLookup;
use crate::interfaces::RuleStore;
use crate::runtime::evaluators::EvaluatorRegistry;
use crate::runtime::evaluators::RouteMatch;
use crate::runtime::evaluators::language::FIELD_ORIGINAL_LANGUAGE;
use crate::runtime::evaluators::year::FIELD_YEAR;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Resolver errors.
///
/// # Invariants
/// - Evaluator-family failures never surface here; they are absorbed by the
///   owning evaluator. Only instance-registry failures abort resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Instance registry read failed; decisions cannot be validated.
    #[error("instance registry unavailable: {0}")]
    Instances(#[from] InstanceRegistryError),
}

// ============================================================================
// SECTION: Resolution Output
// ============================================================================

/// Per-family trace entry recorded during resolution.
///
/// # Invariants
/// - One entry per evaluator that ran, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorTraceEntry {
    /// Family that ran.
    pub family: RuleFamily,
    /// Number of rule matches the family produced.
    pub matches: usize,
}

/// Final resolution for one content item.
///
/// # Invariants
/// - `decisions` holds either one `route` verdict per target instance or a
///   single `require_approval` verdict; it is empty when nothing matched
///   and no default instance is configured.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Final verdicts, deterministically ordered (weight descending, then
    /// instance id ascending).
    pub decisions: Vec<RouterDecision>,
    /// Per-family evaluation trace.
    pub trace: Vec<EvaluatorTraceEntry>,
}

impl Resolution {
    /// Returns true when no verdict was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Priority-ordered decision resolver.
pub struct DecisionResolver {
    /// Registered family evaluators.
    registry: EvaluatorRegistry,
    /// Rule storage collaborator (metadata-dependency pre-checks).
    rules: Arc<dyn RuleStore>,
    /// Instance registry for decision validation and fallback.
    instances: Arc<dyn InstanceRegistry>,
    /// Optional lookup handle for one-shot item enrichment.
    lookup: Option<Arc<dyn MetadataLookup>>,
}

impl DecisionResolver {
    /// Creates a resolver with the default evaluator families registered.
    #[must_use]
    pub fn new(
        rules: Arc<dyn RuleStore>,
        instances: Arc<dyn InstanceRegistry>,
        lookup: Option<Arc<dyn MetadataLookup>>,
    ) -> Self {
        let registry = EvaluatorRegistry::with_default_families(Arc::clone(&rules), lookup.clone());
        Self {
            registry,
            rules,
            instances,
            lookup,
        }
    }

    /// Returns the evaluator registry (metadata surface for rule authoring).
    #[must_use]
    pub const fn registry(&self) -> &EvaluatorRegistry {
        &self.registry
    }

    /// Resolves the routing decision set for one content item.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the instance registry cannot be read;
    /// evaluator-family failures are absorbed per family.
    pub fn resolve(
        &self,
        item: &ContentItem,
        ctx: &RoutingContext,
    ) -> Result<Resolution, ResolveError> {
        let enriched = self.enrich_item(item, ctx);
        let evaluation_item = enriched.as_ref().unwrap_or(item);

        let mut matches = Vec::new();
        let mut trace = Vec::new();
        for evaluator in self.registry.evaluators() {
            if !evaluator.can_evaluate(evaluation_item, ctx) {
                continue;
            }
            let produced = evaluator.evaluate(evaluation_item, ctx).unwrap_or_default();
            trace.push(EvaluatorTraceEntry {
                family: evaluator.family(),
                matches: produced.len(),
            });
            matches.extend(produced);
        }

        let winners = resolve_instance_conflicts(matches);
        let valid = self.validate_targets(winners)?;
        let decisions = if valid.is_empty() {
            self.fallback_decision(ctx.content_type)?.map_or_else(Vec::new, |decision| {
                vec![RouterDecision::Route {
                    routing: decision,
                }]
            })
        } else {
            assemble_decisions(valid)
        };

        Ok(Resolution {
            decisions,
            trace,
        })
    }

    /// Enriches the item with lookup metadata when rules need it.
    ///
    /// One lookup is shared by every family: it runs only when the item
    /// carries no metadata, a lookup handle is configured, and at least one
    /// enabled rule depends on lookup-resolved fields.
    fn enrich_item(&self, item: &ContentItem, ctx: &RoutingContext) -> Option<ContentItem> {
        if item.metadata.is_some() {
            return None;
        }
        let lookup = self.lookup.as_ref()?;
        if !self.metadata_rules_exist(ctx.content_type) {
            return None;
        }
        let resolved = match ctx.content_type {
            ContentType::Movie => {
                let tmdb = item.guid_for("tmdb")?.numeric_value()?;
                lookup.movie_by_tmdb(tmdb)
            }
            ContentType::Show => {
                let tvdb = item.guid_for("tvdb")?.numeric_value()?;
                lookup.series_by_tvdb(tvdb)
            }
        };
        match resolved {
            Ok(Some(metadata)) => Some(item.with_metadata(metadata)),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(title = %item.title, error = %err, "item enrichment failed");
                None
            }
        }
    }

    /// Returns true when any enabled rule depends on lookup metadata.
    fn metadata_rules_exist(&self, content_type: ContentType) -> bool {
        let service = TargetService::for_content_type(content_type);
        let families = [RuleFamily::Year, RuleFamily::Language];
        for family in families {
            match self.rules.rules_by_family(family, service) {
                Ok(rules) if !rules.is_empty() => return true,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(family = %family, error = %err, "metadata pre-check failed");
                }
            }
        }
        match self.rules.rules_by_family(RuleFamily::Conditional, service) {
            Ok(rules) => rules.iter().any(|rule| {
                if let crate::core::RuleCriteria::Condition {
                    root,
                } = &rule.criteria
                {
                    root.referenced_fields()
                        .iter()
                        .any(|field| *field == FIELD_YEAR || *field == FIELD_ORIGINAL_LANGUAGE)
                } else {
                    false
                }
            }),
            Err(err) => {
                tracing::warn!(error = %err, "conditional metadata pre-check failed");
                false
            }
        }
    }

    /// Drops winners whose target instance is unknown, disabled, or runs
    /// the wrong service.
    fn validate_targets(
        &self,
        winners: Vec<RouteMatch>,
    ) -> Result<Vec<RouteMatch>, ResolveError> {
        let mut valid = Vec::with_capacity(winners.len());
        for winner in winners {
            let instance = self.instances.instance(winner.decision.instance_id)?;
            match instance {
                Some(config) if config.enabled && config.service == winner.decision.service => {
                    valid.push(winner);
                }
                Some(_) | None => {
                    tracing::warn!(
                        instance = %winner.decision.instance_id,
                        "decision dropped: instance unknown, disabled, or wrong service"
                    );
                }
            }
        }
        Ok(valid)
    }

    /// Builds the default-instance fallback decision, when configured.
    fn fallback_decision(
        &self,
        content_type: ContentType,
    ) -> Result<Option<RoutingDecision>, ResolveError> {
        let service = TargetService::for_content_type(content_type);
        let Some(instance) = self.instances.default_instance(service)? else {
            return Ok(None);
        };
        if !instance.enabled {
            tracing::warn!(instance = %instance.id, "default instance disabled; no fallback");
            return Ok(None);
        }
        Ok(Some(decision_from_instance(&instance)))
    }
}

// ============================================================================
// SECTION: Aggregation
// ============================================================================

/// Resolves same-instance conflicts: higher weight wins, ties break on the
/// lower rule id. Distinct instances never conflict.
fn resolve_instance_conflicts(matches: Vec<RouteMatch>) -> Vec<RouteMatch> {
    let mut by_instance: BTreeMap<InstanceId, RouteMatch> = BTreeMap::new();
    for candidate in matches {
        match by_instance.get(&candidate.decision.instance_id) {
            Some(current) if !beats(&candidate, current) => {}
            _ => {
                let _ = by_instance.insert(candidate.decision.instance_id, candidate);
            }
        }
    }
    let mut winners: Vec<RouteMatch> = by_instance.into_values().collect();
    winners.sort_by(|a, b| {
        b.decision
            .weight
            .cmp(&a.decision.weight)
            .then_with(|| a.decision.instance_id.cmp(&b.decision.instance_id))
    });
    winners
}

/// Returns true when `candidate` beats `current` for one instance slot.
fn beats(candidate: &RouteMatch, current: &RouteMatch) -> bool {
    if candidate.decision.weight != current.decision.weight {
        return candidate.decision.weight > current.decision.weight;
    }
    match (candidate.decision.rule_id, current.decision.rule_id) {
        (Some(a), Some(b)) => a < b,
        (Some(_), None) => true,
        (None, Some(_) | None) => false,
    }
}

/// Assembles final verdicts from validated winners.
///
/// When any winning rule forces approval, the whole routing set collapses
/// into one require-approval verdict; otherwise one route verdict per
/// instance is emitted.
fn assemble_decisions(winners: Vec<RouteMatch>) -> Vec<RouterDecision> {
    let forcing = winners.iter().find(|winner| winner.requires_approval).cloned();
    match forcing {
        Some(forcer) => {
            let trigger = if forcer.family == RuleFamily::Conditional {
                ApprovalTrigger::ContentCriteria
            } else {
                ApprovalTrigger::RouterRule
            };
            let reason = forcer
                .approval_reason
                .clone()
                .unwrap_or_else(|| "routing rule requires approval".to_string());
            let proposed: Vec<RoutingDecision> =
                winners.into_iter().map(|winner| winner.decision).collect();
            vec![RouterDecision::RequireApproval {
                approval: ApprovalContext {
                    reason,
                    triggered_by: trigger,
                    router_rule_id: forcer.decision.rule_id,
                    data: forcer.decision.rule_id.map(|rule_id| json!({"rule_id": rule_id})),
                    proposed_routing: proposed,
                },
            }]
        }
        None => winners
            .into_iter()
            .map(|winner| RouterDecision::Route {
                routing: winner.decision,
            })
            .collect(),
    }
}

/// Builds the fallback decision from an instance's own configuration.
fn decision_from_instance(instance: &InstanceConfig) -> RoutingDecision {
    RoutingDecision {
        instance_id: instance.id,
        service: instance.service,
        quality_profile: instance.quality_profile.clone(),
        root_folder: instance.root_folder.clone(),
        tags: instance.tags.clone(),
        weight: 0,
        rule_id: None,
        search_on_add: Some(instance.search_on_add),
        season_monitoring: instance.season_monitoring.clone(),
        series_type: None,
    }
}
