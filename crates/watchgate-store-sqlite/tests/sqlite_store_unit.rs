// crates/watchgate-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Store Unit Tests
// Description: Schema versioning, rule round-trips, ledger counting, and
//              conditional approval transitions.
// Purpose: Validate durability-facing invariants of the SQLite store.
// Dependencies: watchgate-store-sqlite, watchgate-core, rusqlite, tempfile
// ============================================================================

//! Unit-level tests for `SQLite` store invariants:
//! - Schema version validation (fail closed on mismatch)
//! - Rule save validation and criteria round-trips
//! - Usage ledger window counting and retention pruning
//! - Conditional approval transitions under concurrency
//! - Expiry sweep behavior

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::thread;

use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;
use time::Date;
use time::macros::datetime;
use time::macros::format_description;
use watchgate_core::ApprovalRequestDraft;
use watchgate_core::ApprovalStatus;
use watchgate_core::ApprovalTrigger;
use watchgate_core::ConditionOperator;
use watchgate_core::ContentType;
use watchgate_core::Guid;
use watchgate_core::InstanceId;
use watchgate_core::QuotaType;
use watchgate_core::QuotaUsage;
use watchgate_core::RouterDecision;
use watchgate_core::RouterRuleDraft;
use watchgate_core::RoutingDecision;
use watchgate_core::RuleCriteria;
use watchgate_core::RuleFamily;
use watchgate_core::TargetService;
use watchgate_core::UserId;
use watchgate_core::UserQuota;
use watchgate_core::interfaces::ApprovalStore;
use watchgate_core::interfaces::InstanceRegistry;
use watchgate_core::interfaces::QuotaStore;
use watchgate_core::interfaces::RuleStore;
use watchgate_core::interfaces::RuleStoreError;
use watchgate_core::interfaces::TransitionOutcome;
use watchgate_store_sqlite::InstanceDraft;
use watchgate_store_sqlite::SqliteStore;
use watchgate_store_sqlite::SqliteStoreConfig;
use watchgate_store_sqlite::SqliteStoreError;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn store_at(path: &Path) -> SqliteStore {
    SqliteStore::new(SqliteStoreConfig::for_path(path)).expect("store init")
}

fn radarr_instance() -> InstanceDraft {
    InstanceDraft {
        label: "radarr-main".to_string(),
        service: TargetService::Radarr,
        enabled: true,
        is_default: true,
        quality_profile: Some("Any".to_string()),
        root_folder: Some("/media/movies".to_string()),
        tags: vec!["auto".to_string()],
        search_on_add: true,
        season_monitoring: None,
    }
}

fn genre_rule(instance_id: InstanceId) -> RouterRuleDraft {
    RouterRuleDraft {
        name: "horror-route".to_string(),
        service: TargetService::Radarr,
        instance_id,
        quality_profile: Some("HD-1080p".to_string()),
        root_folder: None,
        tags: vec!["horror".to_string()],
        priority: 50,
        enabled: true,
        criteria: RuleCriteria::Genre {
            genres: vec!["Horror".to_string()],
            operator: ConditionOperator::In,
        },
        series_type: None,
        season_monitoring: None,
        search_on_add: Some(true),
        require_approval: false,
        approval_reason: None,
    }
}

fn user(raw: u64) -> UserId {
    UserId::from_raw(raw).expect("nonzero user id")
}

fn date(raw: &str) -> Date {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw, &format).expect("date literal")
}

fn approval_draft(user_id: UserId, expires_at: Option<time::OffsetDateTime>) -> ApprovalRequestDraft {
    ApprovalRequestDraft {
        user_id,
        content_type: ContentType::Movie,
        content_title: "Deferred Pick".to_string(),
        content_key: "tmdb:603".to_string(),
        content_guids: vec![Guid::parse("tmdb:603").expect("guid")],
        proposed_decision: RouterDecision::Route {
            routing: RoutingDecision {
                instance_id: InstanceId::from_raw(5).expect("instance id"),
                service: TargetService::Radarr,
                quality_profile: Some("HD".to_string()),
                root_folder: None,
                tags: Vec::new(),
                weight: 10,
                rule_id: None,
                search_on_add: Some(true),
                season_monitoring: None,
                series_type: None,
            },
        },
        router_rule_id: None,
        triggered_by: ApprovalTrigger::QuotaExceeded,
        approval_reason: Some("daily quota exceeded".to_string()),
        expires_at,
    }
}

// ============================================================================
// SECTION: Schema Versioning
// ============================================================================

#[test]
fn reopening_an_initialized_store_succeeds() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("watchgate.db");
    drop(store_at(&path));
    drop(store_at(&path));
}

#[test]
fn unsupported_schema_versions_fail_closed() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("watchgate.db");
    drop(store_at(&path));

    let connection = Connection::open(&path).expect("open raw");
    connection
        .execute("UPDATE store_meta SET version = ?1", params![99_i64])
        .expect("bump version");
    drop(connection);

    let result = SqliteStore::new(SqliteStoreConfig::for_path(&path));
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

// ============================================================================
// SECTION: Rules and Instances
// ============================================================================

#[test]
fn saved_rules_round_trip_with_their_criteria() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    let instance = store.insert_instance(&radarr_instance()).expect("instance");

    let saved = store.save_rule(genre_rule(instance.id)).expect("save rule");
    assert_eq!(saved.family, RuleFamily::Genre);

    let loaded = store
        .rules_by_family(RuleFamily::Genre, TargetService::Radarr)
        .expect("load rules");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0], saved);
}

#[test]
fn rules_by_family_filters_family_service_and_enabled() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    let instance = store.insert_instance(&radarr_instance()).expect("instance");

    store.save_rule(genre_rule(instance.id)).expect("save rule");
    let mut disabled = genre_rule(instance.id);
    disabled.name = "disabled".to_string();
    disabled.enabled = false;
    store.save_rule(disabled).expect("save rule");

    let loaded = store
        .rules_by_family(RuleFamily::Genre, TargetService::Radarr)
        .expect("load rules");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "horror-route");
    assert!(
        store
            .rules_by_family(RuleFamily::Year, TargetService::Radarr)
            .expect("load rules")
            .is_empty()
    );
    assert!(
        store
            .rules_by_family(RuleFamily::Genre, TargetService::Sonarr)
            .expect("load rules")
            .is_empty()
    );
}

#[test]
fn saving_a_rule_against_a_missing_instance_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    let result = store.save_rule(genre_rule(InstanceId::from_raw(77).expect("id")));
    assert!(matches!(result, Err(RuleStoreError::InstanceReference(_))));
}

#[test]
fn saving_a_rule_against_the_wrong_service_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    let mut sonarr = radarr_instance();
    sonarr.service = TargetService::Sonarr;
    let instance = store.insert_instance(&sonarr).expect("instance");

    let result = store.save_rule(genre_rule(instance.id));
    assert!(matches!(result, Err(RuleStoreError::InstanceReference(_))));
}

#[test]
fn default_instance_is_resolved_per_service() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    let created = store.insert_instance(&radarr_instance()).expect("instance");

    let found = store.default_instance(TargetService::Radarr).expect("default");
    assert_eq!(found.as_ref().map(|instance| instance.id), Some(created.id));
    assert!(store.default_instance(TargetService::Sonarr).expect("default").is_none());
}

#[test]
fn deleted_rules_stop_matching() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    let instance = store.insert_instance(&radarr_instance()).expect("instance");
    let saved = store.save_rule(genre_rule(instance.id)).expect("save rule");

    assert!(store.delete_rule(saved.id).expect("delete"));
    assert!(!store.delete_rule(saved.id).expect("delete again"));
    assert!(
        store
            .rules_by_family(RuleFamily::Genre, TargetService::Radarr)
            .expect("load rules")
            .is_empty()
    );
}

// ============================================================================
// SECTION: Quotas and the Usage Ledger
// ============================================================================

#[test]
fn quota_config_round_trips_and_deletes() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    let quota = UserQuota {
        user_id: user(9),
        quota_type: QuotaType::WeeklyRolling,
        quota_limit: 5,
        bypass_approval: true,
    };
    store.upsert_user_quota(&quota).expect("upsert");

    assert_eq!(store.user_quota(user(9)).expect("load"), Some(quota));
    assert!(store.delete_user_quota(user(9)).expect("delete"));
    assert_eq!(store.user_quota(user(9)).expect("load"), None);
}

#[test]
fn usage_counting_is_window_and_type_scoped() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    for (content_type, day) in [
        (ContentType::Movie, "2026-03-10"),
        (ContentType::Movie, "2026-03-12"),
        (ContentType::Movie, "2026-03-20"),
        (ContentType::Show, "2026-03-12"),
    ] {
        store
            .record_usage(QuotaUsage {
                user_id: user(9),
                content_type,
                request_date: date(day),
            })
            .expect("record");
    }

    let count = store
        .usage_count_between(user(9), ContentType::Movie, date("2026-03-09"), date("2026-03-15"))
        .expect("count");
    assert_eq!(count, 2);

    let oldest = store
        .oldest_usage_between(user(9), ContentType::Movie, date("2026-03-09"), date("2026-03-15"))
        .expect("oldest");
    assert_eq!(oldest, Some(date("2026-03-10")));
}

#[test]
fn retention_pruning_removes_only_older_rows() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    for day in ["2026-01-01", "2026-02-01", "2026-03-01"] {
        store
            .record_usage(QuotaUsage {
                user_id: user(9),
                content_type: ContentType::Movie,
                request_date: date(day),
            })
            .expect("record");
    }

    let pruned = store.prune_usage_before(date("2026-02-01")).expect("prune");
    assert_eq!(pruned, 1);
    let remaining = store
        .usage_count_between(user(9), ContentType::Movie, date("2026-01-01"), date("2026-12-31"))
        .expect("count");
    assert_eq!(remaining, 2);
}

// ============================================================================
// SECTION: Approval Requests
// ============================================================================

#[test]
fn approval_requests_round_trip_with_their_stored_decision() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    let now = datetime!(2026-03-14 12:00:00 UTC);

    let created = store.create(approval_draft(user(9), None), now).expect("create");
    let loaded = store.get(created.id).expect("get").expect("present");

    assert_eq!(loaded, created);
    assert_eq!(loaded.status, ApprovalStatus::Pending);
    assert_eq!(
        loaded.proposed_decision.routing().map(|routing| routing.instance_id.get()),
        Some(5)
    );
}

#[test]
fn transition_applies_once_and_reports_settled_after() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    let now = datetime!(2026-03-14 12:00:00 UTC);
    let created = store.create(approval_draft(user(9), None), now).expect("create");

    let first = store
        .transition_if_pending(created.id, ApprovalStatus::Approved, Some("admin"), None, now)
        .expect("transition");
    let TransitionOutcome::Applied(applied) = first else {
        panic!("expected applied transition");
    };
    assert_eq!(applied.status, ApprovalStatus::Approved);
    assert_eq!(applied.approved_by.as_deref(), Some("admin"));

    let second = store
        .transition_if_pending(created.id, ApprovalStatus::Rejected, Some("other"), None, now)
        .expect("transition");
    assert_eq!(second, TransitionOutcome::AlreadySettled(ApprovalStatus::Approved));
}

#[test]
fn transition_on_a_missing_request_reports_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    let now = datetime!(2026-03-14 12:00:00 UTC);
    let missing = watchgate_core::ApprovalRequestId::from_raw(404).expect("id");

    let outcome = store
        .transition_if_pending(missing, ApprovalStatus::Approved, Some("admin"), None, now)
        .expect("transition");
    assert_eq!(outcome, TransitionOutcome::NotFound);
}

#[test]
fn concurrent_transitions_apply_exactly_once() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    let now = datetime!(2026-03-14 12:00:00 UTC);
    let created = store.create(approval_draft(user(9), None), now).expect("create");

    let mut handles = Vec::new();
    for index in 0 .. 8 {
        let store = store.clone();
        let id = created.id;
        handles.push(thread::spawn(move || {
            let decider = format!("admin-{index}");
            store
                .transition_if_pending(id, ApprovalStatus::Approved, Some(&decider), None, now)
                .expect("transition")
        }));
    }
    let outcomes: Vec<TransitionOutcome> =
        handles.into_iter().map(|handle| handle.join().expect("join")).collect();

    let applied = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, TransitionOutcome::Applied(_)))
        .count();
    assert_eq!(applied, 1);
}

#[test]
fn expiry_sweep_settles_overdue_pending_requests_only() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    let created_at = datetime!(2026-03-14 12:00:00 UTC);
    let deadline = datetime!(2026-03-15 12:00:00 UTC);

    let overdue = store
        .create(approval_draft(user(9), Some(deadline)), created_at)
        .expect("create");
    let open_ended = store.create(approval_draft(user(9), None), created_at).expect("create");

    let swept = store.expire_due(datetime!(2026-03-16 00:00:00 UTC)).expect("sweep");
    assert_eq!(swept, 1);

    let pending = store.list_pending().expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, open_ended.id);

    // An expired request can no longer be approved.
    let outcome = store
        .transition_if_pending(
            overdue.id,
            ApprovalStatus::Approved,
            Some("admin"),
            None,
            datetime!(2026-03-16 00:05:00 UTC),
        )
        .expect("transition");
    assert_eq!(outcome, TransitionOutcome::AlreadySettled(ApprovalStatus::Expired));
}

#[test]
fn deleting_a_request_removes_the_record() {
    let dir = TempDir::new().expect("tempdir");
    let store = store_at(&dir.path().join("watchgate.db"));
    let now = datetime!(2026-03-14 12:00:00 UTC);
    let created = store.create(approval_draft(user(9), None), now).expect("create");

    assert!(store.delete(created.id).expect("delete"));
    assert!(!store.delete(created.id).expect("delete again"));
    assert!(store.get(created.id).expect("get").is_none());
}
