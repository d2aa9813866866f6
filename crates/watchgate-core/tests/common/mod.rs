// crates/watchgate-core/tests/common/mod.rs
// ============================================================================
// Module: Core Test Helpers
// Description: Shared builders and test doubles for engine tests.
// Purpose: Keep per-test setup small and uniform.
// Dependencies: watchgate-core, time
// ============================================================================

//! Shared fixtures: content/context builders, rule drafts, a recording
//! acquisition dispatcher, and failing store doubles.

#![allow(
    dead_code,
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted; not every test binary uses every helper."
)]

use std::sync::Arc;
use std::sync::Mutex;

use time::OffsetDateTime;
use time::macros::datetime;
use watchgate_core::AcquisitionCommand;
use watchgate_core::AcquisitionReceipt;
use watchgate_core::ContentItem;
use watchgate_core::ContentMetadata;
use watchgate_core::ContentType;
use watchgate_core::Guid;
use watchgate_core::InstanceConfig;
use watchgate_core::InstanceId;
use watchgate_core::RouterRule;
use watchgate_core::RouterRuleDraft;
use watchgate_core::RoutingContext;
use watchgate_core::RuleCriteria;
use watchgate_core::RuleFamily;
use watchgate_core::TargetService;
use watchgate_core::UserAttribution;
use watchgate_core::UserId;
use watchgate_core::interfaces::AcquisitionDispatcher;
use watchgate_core::interfaces::DispatchError;
use watchgate_core::interfaces::LookupError;
use watchgate_core::interfaces::MetadataLookup;
use watchgate_core::interfaces::QuotaStore;
use watchgate_core::interfaces::QuotaStoreError;
use watchgate_core::interfaces::RuleStore;
use watchgate_core::interfaces::RuleStoreError;

// ============================================================================
// SECTION: Time
// ============================================================================

/// Fixed evaluation instant used across tests.
pub fn fixed_now() -> OffsetDateTime {
    datetime!(2026-03-14 12:00:00 UTC)
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds an instance id from a raw value.
pub fn instance_id(raw: u64) -> InstanceId {
    InstanceId::from_raw(raw).expect("nonzero instance id")
}

/// Builds a user id from a raw value.
pub fn user_id(raw: u64) -> UserId {
    UserId::from_raw(raw).expect("nonzero user id")
}

/// Builds an enabled instance config.
pub fn instance(raw_id: u64, service: TargetService, is_default: bool) -> InstanceConfig {
    InstanceConfig {
        id: instance_id(raw_id),
        label: format!("instance-{raw_id}"),
        service,
        enabled: true,
        is_default,
        quality_profile: Some("Any".to_string()),
        root_folder: Some("/media".to_string()),
        tags: Vec::new(),
        search_on_add: true,
        season_monitoring: None,
    }
}

/// Builds a movie item with a TMDB guid and the given genres.
pub fn movie_item(title: &str, genres: &[&str]) -> ContentItem {
    ContentItem::new(
        title,
        vec![Guid::parse("tmdb:603").expect("guid")],
        genres.iter().map(ToString::to_string).collect(),
    )
}

/// Builds a movie item carrying attached metadata.
pub fn movie_item_with_metadata(
    title: &str,
    genres: &[&str],
    metadata: ContentMetadata,
) -> ContentItem {
    movie_item(title, genres).with_metadata(metadata)
}

/// Builds a movie routing context attributed to one user.
pub fn movie_ctx(user_raw: u64) -> RoutingContext {
    let mut ctx = RoutingContext::new(ContentType::Movie);
    ctx.users = vec![UserAttribution::from_id(user_id(user_raw))];
    ctx
}

/// Builds a movie routing context with no attribution.
pub fn anonymous_movie_ctx() -> RoutingContext {
    RoutingContext::new(ContentType::Movie)
}

/// Builds a rule draft with common defaults for the given criteria.
pub fn draft(
    name: &str,
    instance_raw: u64,
    priority: i32,
    criteria: RuleCriteria,
) -> RouterRuleDraft {
    RouterRuleDraft {
        name: name.to_string(),
        service: TargetService::Radarr,
        instance_id: instance_id(instance_raw),
        quality_profile: Some("HD-1080p".to_string()),
        root_folder: Some("/media/movies".to_string()),
        tags: Vec::new(),
        priority,
        enabled: true,
        criteria,
        series_type: None,
        season_monitoring: None,
        search_on_add: None,
        require_approval: false,
        approval_reason: None,
    }
}

/// Builds a genre rule draft matching any of the given genres.
pub fn genre_draft(name: &str, instance_raw: u64, priority: i32, genres: &[&str]) -> RouterRuleDraft {
    draft(
        name,
        instance_raw,
        priority,
        RuleCriteria::Genre {
            genres: genres.iter().map(ToString::to_string).collect(),
            operator: watchgate_core::ConditionOperator::In,
        },
    )
}

// ============================================================================
// SECTION: Test Doubles
// ============================================================================

/// Acquisition dispatcher that records every command.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    /// Commands received, in dispatch order.
    pub commands: Mutex<Vec<AcquisitionCommand>>,
    /// When true, every dispatch fails.
    pub fail: bool,
}

impl RecordingDispatcher {
    /// Creates a dispatcher that accepts every command.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a dispatcher that fails every command.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            commands: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    /// Returns the recorded commands.
    pub fn recorded(&self) -> Vec<AcquisitionCommand> {
        self.commands.lock().expect("commands lock").clone()
    }
}

impl AcquisitionDispatcher for RecordingDispatcher {
    fn dispatch(&self, command: &AcquisitionCommand) -> Result<AcquisitionReceipt, DispatchError> {
        if self.fail {
            return Err(DispatchError::DispatchFailed("dispatcher down".to_string()));
        }
        self.commands.lock().expect("commands lock").push(command.clone());
        Ok(AcquisitionReceipt {
            instance_id: command.routing.instance_id,
            dispatched_at: fixed_now(),
        })
    }
}

/// Rule store whose every read fails.
#[derive(Debug, Default)]
pub struct FailingRuleStore;

impl RuleStore for FailingRuleStore {
    fn rules_by_family(
        &self,
        _family: RuleFamily,
        _service: TargetService,
    ) -> Result<Vec<RouterRule>, RuleStoreError> {
        Err(RuleStoreError::Io("rule store offline".to_string()))
    }

    fn enabled_rules(&self, _service: TargetService) -> Result<Vec<RouterRule>, RuleStoreError> {
        Err(RuleStoreError::Io("rule store offline".to_string()))
    }

    fn save_rule(&self, _draft: RouterRuleDraft) -> Result<RouterRule, RuleStoreError> {
        Err(RuleStoreError::Io("rule store offline".to_string()))
    }

    fn delete_rule(&self, _rule_id: watchgate_core::RuleId) -> Result<bool, RuleStoreError> {
        Err(RuleStoreError::Io("rule store offline".to_string()))
    }
}

/// Quota store whose every read fails.
#[derive(Debug, Default)]
pub struct FailingQuotaStore;

impl QuotaStore for FailingQuotaStore {
    fn user_quota(
        &self,
        _user_id: UserId,
    ) -> Result<Option<watchgate_core::UserQuota>, QuotaStoreError> {
        Err(QuotaStoreError::Io("quota store offline".to_string()))
    }

    fn usage_count_between(
        &self,
        _user_id: UserId,
        _content_type: ContentType,
        _from: time::Date,
        _to: time::Date,
    ) -> Result<u64, QuotaStoreError> {
        Err(QuotaStoreError::Io("quota store offline".to_string()))
    }

    fn oldest_usage_between(
        &self,
        _user_id: UserId,
        _content_type: ContentType,
        _from: time::Date,
        _to: time::Date,
    ) -> Result<Option<time::Date>, QuotaStoreError> {
        Err(QuotaStoreError::Io("quota store offline".to_string()))
    }

    fn record_usage(&self, _usage: watchgate_core::QuotaUsage) -> Result<(), QuotaStoreError> {
        Err(QuotaStoreError::Io("quota store offline".to_string()))
    }

    fn prune_usage_before(&self, _date: time::Date) -> Result<u64, QuotaStoreError> {
        Err(QuotaStoreError::Io("quota store offline".to_string()))
    }
}

/// Metadata lookup that serves a fixed response and counts calls.
#[derive(Debug)]
pub struct StubLookup {
    /// Metadata returned for every query.
    pub metadata: Option<ContentMetadata>,
    /// Number of lookup calls observed.
    pub calls: Mutex<u32>,
    /// When true, every lookup fails.
    pub fail: bool,
}

impl StubLookup {
    /// Creates a lookup serving the given metadata.
    pub fn serving(metadata: ContentMetadata) -> Arc<Self> {
        Arc::new(Self {
            metadata: Some(metadata),
            calls: Mutex::new(0),
            fail: false,
        })
    }

    /// Creates a lookup that fails every call.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            metadata: None,
            calls: Mutex::new(0),
            fail: true,
        })
    }

    /// Returns the number of calls observed.
    pub fn call_count(&self) -> u32 {
        *self.calls.lock().expect("calls lock")
    }

    /// Records one call and returns the configured response.
    fn answer(&self) -> Result<Option<ContentMetadata>, LookupError> {
        *self.calls.lock().expect("calls lock") += 1;
        if self.fail {
            return Err(LookupError::Transport("lookup offline".to_string()));
        }
        Ok(self.metadata.clone())
    }
}

impl MetadataLookup for StubLookup {
    fn movie_by_tmdb(&self, _tmdb_id: u64) -> Result<Option<ContentMetadata>, LookupError> {
        self.answer()
    }

    fn series_by_tvdb(&self, _tvdb_id: u64) -> Result<Option<ContentMetadata>, LookupError> {
        self.answer()
    }
}

/// Widens a stub lookup handle to the trait object the engine expects.
pub fn as_lookup(stub: &Arc<StubLookup>) -> Arc<dyn MetadataLookup> {
    let cloned: Arc<StubLookup> = Arc::clone(stub);
    cloned
}
