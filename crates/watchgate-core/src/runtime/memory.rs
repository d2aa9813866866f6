// crates/watchgate-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Stores
// Description: Mutex-guarded reference implementations of the store
//              interfaces.
// Purpose: Back core tests and lightweight embedders with the same
//          transition semantics as durable stores.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! One shared state object implements the rule store, instance registry,
//! quota store, and approval store interfaces. The approval transition uses
//! the same "only if still pending" conditional semantics as the durable
//! SQLite store, with the interior mutex standing in for the database's
//! single-statement atomicity.
//!
//! Lock poisoning is recovered by taking the inner state: a panicking
//! writer in a test must not cascade into unrelated assertions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use time::Date;
use time::OffsetDateTime;

use crate::core::ApprovalRequest;
use crate::core::ApprovalRequestDraft;
use crate::core::ApprovalRequestId;
use crate::core::ApprovalStatus;
use crate::core::ContentType;
use crate::core::InstanceConfig;
use crate::core::InstanceId;
use crate::core::QuotaUsage;
use crate::core::RouterRule;
use crate::core::RouterRuleDraft;
use crate::core::RuleCriteria;
use crate::core::RuleFamily;
use crate::core::RuleId;
use crate::core::TargetService;
use crate::core::UserId;
use crate::core::UserQuota;
use crate::core::validate_condition_tree;
use crate::interfaces::ApprovalStore;
use crate::interfaces::ApprovalStoreError;
use crate::interfaces::InstanceRegistry;
use crate::interfaces::InstanceRegistryError;
use crate::interfaces::QuotaStore;
use crate::interfaces::QuotaStoreError;
use crate::interfaces::RuleStore;
use crate::interfaces::RuleStoreError;
use crate::interfaces::TransitionOutcome;
use crate::runtime::evaluators::default_field_catalog;

// ============================================================================
// SECTION: State
// ============================================================================

/// Mutable state behind the in-memory stores.
#[derive(Debug, Default)]
struct State {
    /// Persisted rules.
    rules: Vec<RouterRule>,
    /// Next rule identifier.
    next_rule_id: u64,
    /// Configured instances.
    instances: Vec<InstanceConfig>,
    /// Per-user quota configuration.
    quotas: Vec<UserQuota>,
    /// Append-only usage ledger.
    usage: Vec<QuotaUsage>,
    /// Approval requests.
    approvals: Vec<ApprovalRequest>,
    /// Next approval request identifier.
    next_approval_id: u64,
}

/// In-memory implementation of every Watchgate store interface.
///
/// # Invariants
/// - All mutation goes through the interior mutex; the approval transition
///   is atomic with respect to other store calls.
#[derive(Debug, Default)]
pub struct InMemoryStores {
    /// Guarded store state.
    state: Mutex<State>,
}

impl InMemoryStores {
    /// Creates empty stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts an instance configuration.
    pub fn insert_instance(&self, instance: InstanceConfig) {
        self.lock().instances.push(instance);
    }

    /// Inserts a quota configuration, replacing any existing one for the
    /// user.
    pub fn insert_quota(&self, quota: UserQuota) {
        let mut state = self.lock();
        state.quotas.retain(|existing| existing.user_id != quota.user_id);
        state.quotas.push(quota);
    }

    /// Returns the number of ledger rows for a user and content type.
    #[must_use]
    pub fn usage_rows(&self, user_id: UserId, content_type: ContentType) -> usize {
        self.lock()
            .usage
            .iter()
            .filter(|row| row.user_id == user_id && row.content_type == content_type)
            .count()
    }
}

// ============================================================================
// SECTION: Rule Store
// ============================================================================

impl RuleStore for InMemoryStores {
    fn rules_by_family(
        &self,
        family: RuleFamily,
        service: TargetService,
    ) -> Result<Vec<RouterRule>, RuleStoreError> {
        Ok(self
            .lock()
            .rules
            .iter()
            .filter(|rule| rule.enabled && rule.family == family && rule.service == service)
            .cloned()
            .collect())
    }

    fn enabled_rules(&self, service: TargetService) -> Result<Vec<RouterRule>, RuleStoreError> {
        Ok(self
            .lock()
            .rules
            .iter()
            .filter(|rule| rule.enabled && rule.service == service)
            .cloned()
            .collect())
    }

    fn save_rule(&self, draft: RouterRuleDraft) -> Result<RouterRule, RuleStoreError> {
        if let RuleCriteria::Condition {
            root,
        } = &draft.criteria
        {
            validate_condition_tree(root, &default_field_catalog())
                .map_err(|err| RuleStoreError::Invalid(err.to_string()))?;
        }
        let mut state = self.lock();
        let instance_ok = state
            .instances
            .iter()
            .any(|instance| instance.id == draft.instance_id && instance.service == draft.service);
        if !instance_ok {
            return Err(RuleStoreError::InstanceReference(format!(
                "instance {} not configured for {}",
                draft.instance_id, draft.service
            )));
        }
        state.next_rule_id += 1;
        let id = RuleId::from_raw(state.next_rule_id)
            .ok_or_else(|| RuleStoreError::Store("rule id overflow".to_string()))?;
        let rule = RouterRule {
            id,
            name: draft.name,
            family: draft.criteria.family(),
            service: draft.service,
            instance_id: draft.instance_id,
            quality_profile: draft.quality_profile,
            root_folder: draft.root_folder,
            tags: draft.tags,
            priority: draft.priority,
            enabled: draft.enabled,
            criteria: draft.criteria,
            series_type: draft.series_type,
            season_monitoring: draft.season_monitoring,
            search_on_add: draft.search_on_add,
            require_approval: draft.require_approval,
            approval_reason: draft.approval_reason,
        };
        state.rules.push(rule.clone());
        Ok(rule)
    }

    fn delete_rule(&self, rule_id: RuleId) -> Result<bool, RuleStoreError> {
        let mut state = self.lock();
        let before = state.rules.len();
        state.rules.retain(|rule| rule.id != rule_id);
        Ok(state.rules.len() < before)
    }
}

// ============================================================================
// SECTION: Instance Registry
// ============================================================================

impl InstanceRegistry for InMemoryStores {
    fn instance(&self, id: InstanceId) -> Result<Option<InstanceConfig>, InstanceRegistryError> {
        Ok(self.lock().instances.iter().find(|instance| instance.id == id).cloned())
    }

    fn enabled_instances(
        &self,
        service: TargetService,
    ) -> Result<Vec<InstanceConfig>, InstanceRegistryError> {
        Ok(self
            .lock()
            .instances
            .iter()
            .filter(|instance| instance.enabled && instance.service == service)
            .cloned()
            .collect())
    }

    fn default_instance(
        &self,
        service: TargetService,
    ) -> Result<Option<InstanceConfig>, InstanceRegistryError> {
        Ok(self
            .lock()
            .instances
            .iter()
            .find(|instance| instance.is_default && instance.service == service)
            .cloned())
    }
}

// ============================================================================
// SECTION: Quota Store
// ============================================================================

impl QuotaStore for InMemoryStores {
    fn user_quota(&self, user_id: UserId) -> Result<Option<UserQuota>, QuotaStoreError> {
        Ok(self.lock().quotas.iter().find(|quota| quota.user_id == user_id).cloned())
    }

    fn usage_count_between(
        &self,
        user_id: UserId,
        content_type: ContentType,
        from: Date,
        to: Date,
    ) -> Result<u64, QuotaStoreError> {
        let count = self
            .lock()
            .usage
            .iter()
            .filter(|row| {
                row.user_id == user_id
                    && row.content_type == content_type
                    && row.request_date >= from
                    && row.request_date <= to
            })
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    fn oldest_usage_between(
        &self,
        user_id: UserId,
        content_type: ContentType,
        from: Date,
        to: Date,
    ) -> Result<Option<Date>, QuotaStoreError> {
        Ok(self
            .lock()
            .usage
            .iter()
            .filter(|row| {
                row.user_id == user_id
                    && row.content_type == content_type
                    && row.request_date >= from
                    && row.request_date <= to
            })
            .map(|row| row.request_date)
            .min())
    }

    fn record_usage(&self, usage: QuotaUsage) -> Result<(), QuotaStoreError> {
        self.lock().usage.push(usage);
        Ok(())
    }

    fn prune_usage_before(&self, date: Date) -> Result<u64, QuotaStoreError> {
        let mut state = self.lock();
        let before = state.usage.len();
        state.usage.retain(|row| row.request_date >= date);
        let removed = before - state.usage.len();
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

// ============================================================================
// SECTION: Approval Store
// ============================================================================

impl ApprovalStore for InMemoryStores {
    fn create(
        &self,
        draft: ApprovalRequestDraft,
        now: OffsetDateTime,
    ) -> Result<ApprovalRequest, ApprovalStoreError> {
        let mut state = self.lock();
        state.next_approval_id += 1;
        let id = ApprovalRequestId::from_raw(state.next_approval_id)
            .ok_or_else(|| ApprovalStoreError::Store("approval id overflow".to_string()))?;
        let request = ApprovalRequest {
            id,
            user_id: draft.user_id,
            content_type: draft.content_type,
            content_title: draft.content_title,
            content_key: draft.content_key,
            content_guids: draft.content_guids,
            proposed_decision: draft.proposed_decision,
            router_rule_id: draft.router_rule_id,
            triggered_by: draft.triggered_by,
            approval_reason: draft.approval_reason,
            status: ApprovalStatus::Pending,
            approved_by: None,
            approval_notes: None,
            expires_at: draft.expires_at,
            created_at: now,
            updated_at: now,
        };
        state.approvals.push(request.clone());
        Ok(request)
    }

    fn get(
        &self,
        id: ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, ApprovalStoreError> {
        Ok(self.lock().approvals.iter().find(|request| request.id == id).cloned())
    }

    fn list_pending(&self) -> Result<Vec<ApprovalRequest>, ApprovalStoreError> {
        Ok(self
            .lock()
            .approvals
            .iter()
            .filter(|request| request.status == ApprovalStatus::Pending)
            .cloned()
            .collect())
    }

    fn transition_if_pending(
        &self,
        id: ApprovalRequestId,
        to: ApprovalStatus,
        decided_by: Option<&str>,
        notes: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<TransitionOutcome, ApprovalStoreError> {
        let mut state = self.lock();
        let Some(request) = state.approvals.iter_mut().find(|request| request.id == id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if request.status != ApprovalStatus::Pending {
            return Ok(TransitionOutcome::AlreadySettled(request.status));
        }
        request.status = to;
        request.approved_by = decided_by.map(ToString::to_string);
        request.approval_notes = notes.map(ToString::to_string);
        request.updated_at = now;
        Ok(TransitionOutcome::Applied(request.clone()))
    }

    fn delete(&self, id: ApprovalRequestId) -> Result<bool, ApprovalStoreError> {
        let mut state = self.lock();
        let before = state.approvals.len();
        state.approvals.retain(|request| request.id != id);
        Ok(state.approvals.len() < before)
    }

    fn expire_due(&self, now: OffsetDateTime) -> Result<u64, ApprovalStoreError> {
        let mut state = self.lock();
        let mut expired = 0;
        for request in &mut state.approvals {
            if request.status == ApprovalStatus::Pending
                && request.expires_at.is_some_and(|deadline| deadline <= now)
            {
                request.status = ApprovalStatus::Expired;
                request.updated_at = now;
                expired += 1;
            }
        }
        Ok(expired)
    }
}
