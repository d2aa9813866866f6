// crates/watchgate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Store
// Description: Durable rule, instance, quota, and approval stores on SQLite.
// Purpose: Persist engine state with schema versioning and conditional
//          approval transitions.
// Dependencies: watchgate-core, rusqlite, serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! One `SQLite` database holds the four logical tables the engine relies
//! on: `router_rules`, `instances`, `user_quotas` + `quota_usage`, and
//! `approval_requests`. The schema is versioned through a `store_meta`
//! table and fails closed on mismatch. Rule saves validate the criteria
//! payload and the instance reference at the application layer before
//! insert. Approval settlement is a single conditional `UPDATE` guarded by
//! `status = 'pending'`, making concurrent approve/reject/expire actions
//! mutually exclusive across processes.
//!
//! Timestamps are stored as UTC RFC3339 text (lexicographically ordered);
//! ledger dates are stored as `YYYY-MM-DD` text.
//!
//! Security posture: database contents are untrusted on load; malformed
//! rows surface as invalid-data errors instead of panics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use time::Date;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use watchgate_core::ApprovalRequest;
use watchgate_core::ApprovalRequestDraft;
use watchgate_core::ApprovalRequestId;
use watchgate_core::ApprovalStatus;
use watchgate_core::ApprovalTrigger;
use watchgate_core::ContentType;
use watchgate_core::Guid;
use watchgate_core::InstanceConfig;
use watchgate_core::InstanceId;
use watchgate_core::QuotaType;
use watchgate_core::QuotaUsage;
use watchgate_core::RouterDecision;
use watchgate_core::RouterRule;
use watchgate_core::RouterRuleDraft;
use watchgate_core::RuleCriteria;
use watchgate_core::RuleFamily;
use watchgate_core::RuleId;
use watchgate_core::SeriesType;
use watchgate_core::TargetService;
use watchgate_core::UserId;
use watchgate_core::UserQuota;
use watchgate_core::interfaces::ApprovalStore;
use watchgate_core::interfaces::ApprovalStoreError;
use watchgate_core::interfaces::InstanceRegistry;
use watchgate_core::interfaces::InstanceRegistryError;
use watchgate_core::interfaces::QuotaStore;
use watchgate_core::interfaces::QuotaStoreError;
use watchgate_core::interfaces::RuleStore;
use watchgate_core::interfaces::RuleStoreError;
use watchgate_core::interfaces::TransitionOutcome;
use watchgate_core::runtime::default_field_catalog;
use watchgate_core::validate_condition_tree;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
pub const SCHEMA_VERSION: i64 = 1;

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Day-granularity ledger date format.
const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day]");

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for the given path with default settings.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding full rule or decision payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored data failed to decode.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Referential integrity violation at the application layer.
    #[error("sqlite store reference error: {0}")]
    Reference(String),
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

impl From<SqliteStoreError> for RuleStoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Reference(message) => Self::InstanceReference(message),
            SqliteStoreError::Db(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Store(message)
            }
        }
    }
}

impl From<SqliteStoreError> for InstanceRegistryError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message)
            | SqliteStoreError::Invalid(message)
            | SqliteStoreError::VersionMismatch(message)
            | SqliteStoreError::Reference(message) => Self::Store(message),
        }
    }
}

impl From<SqliteStoreError> for QuotaStoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Db(message)
            | SqliteStoreError::VersionMismatch(message)
            | SqliteStoreError::Reference(message) => Self::Store(message),
        }
    }
}

impl From<SqliteStoreError> for ApprovalStoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Db(message)
            | SqliteStoreError::VersionMismatch(message)
            | SqliteStoreError::Reference(message) => Self::Store(message),
        }
    }
}

// ============================================================================
// SECTION: Instance Drafts
// ============================================================================

/// Instance payload submitted for persistence.
///
/// # Invariants
/// - Field semantics match [`InstanceConfig`]; the store assigns the
///   identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDraft {
    /// Display label for the admin surface.
    pub label: String,
    /// Service this instance runs.
    pub service: TargetService,
    /// Whether the instance may receive content.
    pub enabled: bool,
    /// Whether this instance is the fallback target for its service.
    pub is_default: bool,
    /// Default quality profile.
    pub quality_profile: Option<String>,
    /// Default root folder.
    pub root_folder: Option<String>,
    /// Default tags.
    pub tags: Vec<String>,
    /// Default search-on-add behavior.
    pub search_on_add: bool,
    /// Default season monitoring label (Sonarr only).
    pub season_monitoring: Option<String>,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed implementation of every Watchgate store interface.
///
/// # Invariants
/// - Connection access is serialized through a mutex; cross-process
///   serialization relies on `SQLite` single-statement atomicity.
/// - Rows failing to decode surface as invalid-data errors.
#[derive(Clone)]
pub struct SqliteStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens an `SQLite`-backed store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized, or carries an unsupported schema version.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the connection, mapping poisoning to a store error.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("connection mutex poisoned".to_string()))
    }

    /// Verifies the store can execute a simple SQL statement.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the store is unavailable.
    pub fn probe(&self) -> Result<(), SqliteStoreError> {
        let connection = self.lock()?;
        let _: i64 = connection.query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(())
    }

    /// Persists a new instance and returns it with its assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when persistence fails.
    pub fn insert_instance(
        &self,
        draft: &InstanceDraft,
    ) -> Result<InstanceConfig, SqliteStoreError> {
        let tags_json = to_json(&draft.tags)?;
        let connection = self.lock()?;
        connection.execute(
            "INSERT INTO instances (label, service, enabled, is_default, quality_profile,
                root_folder, tags_json, search_on_add, season_monitoring)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                draft.label,
                draft.service.as_str(),
                draft.enabled,
                draft.is_default,
                draft.quality_profile,
                draft.root_folder,
                tags_json,
                draft.search_on_add,
                draft.season_monitoring,
            ],
        )?;
        let id = instance_id_from_rowid(connection.last_insert_rowid())?;
        Ok(InstanceConfig {
            id,
            label: draft.label.clone(),
            service: draft.service,
            enabled: draft.enabled,
            is_default: draft.is_default,
            quality_profile: draft.quality_profile.clone(),
            root_folder: draft.root_folder.clone(),
            tags: draft.tags.clone(),
            search_on_add: draft.search_on_add,
            season_monitoring: draft.season_monitoring.clone(),
        })
    }

    /// Inserts or replaces the quota configured for a user.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when persistence fails.
    pub fn upsert_user_quota(&self, quota: &UserQuota) -> Result<(), SqliteStoreError> {
        let connection = self.lock()?;
        connection.execute(
            "INSERT OR REPLACE INTO user_quotas (user_id, quota_type, quota_limit,
                bypass_approval)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id_to_i64(quota.user_id.get())?,
                quota.quota_type.as_str(),
                quota.quota_limit,
                quota.bypass_approval,
            ],
        )?;
        Ok(())
    }

    /// Removes the quota configured for a user; returns false when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when deletion fails.
    pub fn delete_user_quota(&self, user_id: UserId) -> Result<bool, SqliteStoreError> {
        let connection = self.lock()?;
        let affected = connection.execute(
            "DELETE FROM user_quotas WHERE user_id = ?1",
            params![id_to_i64(user_id.get())?],
        )?;
        Ok(affected > 0)
    }
}

// ============================================================================
// SECTION: Rule Store Implementation
// ============================================================================

/// Column list shared by rule queries.
const RULE_COLUMNS: &str = "id, name, family, service, instance_id, quality_profile, \
                            root_folder, tags_json, priority, enabled, criteria_json, \
                            series_type, season_monitoring, search_on_add, require_approval, \
                            approval_reason";

impl SqliteStore {
    /// Loads rules matching an optional family filter.
    fn load_rules(
        &self,
        family: Option<RuleFamily>,
        service: TargetService,
    ) -> Result<Vec<RouterRule>, SqliteStoreError> {
        let connection = self.lock()?;
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM router_rules
             WHERE enabled = 1 AND service = ?1 AND (?2 IS NULL OR family = ?2)
             ORDER BY priority DESC, id ASC"
        );
        let mut statement = connection.prepare_cached(&sql)?;
        let rows = statement.query_map(
            params![service.as_str(), family.map(RuleFamily::as_str)],
            raw_rule_from_row,
        )?;
        let mut rules = Vec::new();
        for row in rows {
            rules.push(rule_from_raw(row?)?);
        }
        Ok(rules)
    }
}

impl RuleStore for SqliteStore {
    fn rules_by_family(
        &self,
        family: RuleFamily,
        service: TargetService,
    ) -> Result<Vec<RouterRule>, RuleStoreError> {
        Ok(self.load_rules(Some(family), service)?)
    }

    fn enabled_rules(&self, service: TargetService) -> Result<Vec<RouterRule>, RuleStoreError> {
        Ok(self.load_rules(None, service)?)
    }

    fn save_rule(&self, draft: RouterRuleDraft) -> Result<RouterRule, RuleStoreError> {
        if let RuleCriteria::Condition {
            root,
        } = &draft.criteria
        {
            validate_condition_tree(root, &default_field_catalog())
                .map_err(|err| RuleStoreError::Invalid(err.to_string()))?;
        }
        let family = draft.criteria.family();
        let criteria_json = to_json(&draft.criteria)?;
        let tags_json = to_json(&draft.tags)?;
        let connection = self.lock()?;

        // Referential integrity is enforced here: the instance must exist
        // and run the rule's target service.
        let instance_service: Option<String> = connection
            .query_row(
                "SELECT service FROM instances WHERE id = ?1",
                params![id_to_i64(draft.instance_id.get())?],
                |row| row.get(0),
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        match instance_service.as_deref() {
            Some(service) if service == draft.service.as_str() => {}
            Some(service) => {
                return Err(RuleStoreError::InstanceReference(format!(
                    "instance {} runs {service}, rule targets {}",
                    draft.instance_id, draft.service
                )));
            }
            None => {
                return Err(RuleStoreError::InstanceReference(format!(
                    "instance {} is not configured",
                    draft.instance_id
                )));
            }
        }

        connection
            .execute(
                "INSERT INTO router_rules (name, family, service, instance_id, quality_profile,
                    root_folder, tags_json, priority, enabled, criteria_json, series_type,
                    season_monitoring, search_on_add, require_approval, approval_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    draft.name,
                    family.as_str(),
                    draft.service.as_str(),
                    id_to_i64(draft.instance_id.get())?,
                    draft.quality_profile,
                    draft.root_folder,
                    tags_json,
                    draft.priority,
                    draft.enabled,
                    criteria_json,
                    draft.series_type.map(series_type_label),
                    draft.season_monitoring,
                    draft.search_on_add,
                    draft.require_approval,
                    draft.approval_reason,
                ],
            )
            .map_err(SqliteStoreError::from)?;
        let id = rule_id_from_rowid(connection.last_insert_rowid())
            ?;
        Ok(RouterRule {
            id,
            name: draft.name,
            family,
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
        })
    }

    fn delete_rule(&self, rule_id: RuleId) -> Result<bool, RuleStoreError> {
        let connection = self.lock()?;
        let affected = connection
            .execute(
                "DELETE FROM router_rules WHERE id = ?1",
                params![id_to_i64(rule_id.get())?],
            )
            .map_err(SqliteStoreError::from)?;
        Ok(affected > 0)
    }

    fn readiness(&self) -> Result<(), RuleStoreError> {
        Ok(self.probe()?)
    }
}

// ============================================================================
// SECTION: Instance Registry Implementation
// ============================================================================

/// Column list shared by instance queries.
const INSTANCE_COLUMNS: &str = "id, label, service, enabled, is_default, quality_profile, \
                                root_folder, tags_json, search_on_add, season_monitoring";

impl SqliteStore {
    /// Loads instances matching a SQL filter clause.
    fn load_instances(
        &self,
        clause: &str,
        filter_params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<InstanceConfig>, SqliteStoreError> {
        let connection = self.lock()?;
        let sql = format!("SELECT {INSTANCE_COLUMNS} FROM instances WHERE {clause} ORDER BY id");
        let mut statement = connection.prepare_cached(&sql)?;
        let rows = statement.query_map(filter_params, raw_instance_from_row)?;
        let mut instances = Vec::new();
        for row in rows {
            instances.push(instance_from_raw(row?)?);
        }
        Ok(instances)
    }
}

impl InstanceRegistry for SqliteStore {
    fn instance(&self, id: InstanceId) -> Result<Option<InstanceConfig>, InstanceRegistryError> {
        let raw_id = id_to_i64(id.get())?;
        let instances = self.load_instances("id = ?1", &[&raw_id])?;
        Ok(instances.into_iter().next())
    }

    fn enabled_instances(
        &self,
        service: TargetService,
    ) -> Result<Vec<InstanceConfig>, InstanceRegistryError> {
        Ok(self.load_instances("enabled = 1 AND service = ?1", &[&service.as_str()])?)
    }

    fn default_instance(
        &self,
        service: TargetService,
    ) -> Result<Option<InstanceConfig>, InstanceRegistryError> {
        let instances =
            self.load_instances("is_default = 1 AND service = ?1", &[&service.as_str()])?;
        Ok(instances.into_iter().next())
    }
}

// ============================================================================
// SECTION: Quota Store Implementation
// ============================================================================

impl QuotaStore for SqliteStore {
    fn user_quota(&self, user_id: UserId) -> Result<Option<UserQuota>, QuotaStoreError> {
        let connection = self.lock()?;
        let row = connection
            .query_row(
                "SELECT quota_type, quota_limit, bypass_approval
                 FROM user_quotas WHERE user_id = ?1",
                params![id_to_i64(user_id.get())?],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(SqliteStoreError::from)?;
        match row {
            None => Ok(None),
            Some((quota_type, quota_limit, bypass_approval)) => Ok(Some(UserQuota {
                user_id,
                quota_type: parse_quota_type(&quota_type)
                    ?,
                quota_limit,
                bypass_approval,
            })),
        }
    }

    fn usage_count_between(
        &self,
        user_id: UserId,
        content_type: ContentType,
        from: Date,
        to: Date,
    ) -> Result<u64, QuotaStoreError> {
        let connection = self.lock()?;
        let count: i64 = connection
            .query_row(
                "SELECT COUNT(1) FROM quota_usage
                 WHERE user_id = ?1 AND content_type = ?2
                   AND request_date >= ?3 AND request_date <= ?4",
                params![
                    id_to_i64(user_id.get())?,
                    content_type.as_str(),
                    format_date(from)?,
                    format_date(to)?,
                ],
                |row| row.get(0),
            )
            .map_err(SqliteStoreError::from)?;
        u64::try_from(count)
            .map_err(|_| QuotaStoreError::Invalid(format!("negative usage count: {count}")))
    }

    fn oldest_usage_between(
        &self,
        user_id: UserId,
        content_type: ContentType,
        from: Date,
        to: Date,
    ) -> Result<Option<Date>, QuotaStoreError> {
        let connection = self.lock()?;
        let oldest: Option<String> = connection
            .query_row(
                "SELECT MIN(request_date) FROM quota_usage
                 WHERE user_id = ?1 AND content_type = ?2
                   AND request_date >= ?3 AND request_date <= ?4",
                params![
                    id_to_i64(user_id.get())?,
                    content_type.as_str(),
                    format_date(from)?,
                    format_date(to)?,
                ],
                |row| row.get(0),
            )
            .map_err(SqliteStoreError::from)?;
        match oldest {
            None => Ok(None),
            Some(raw) => Ok(Some(parse_date(&raw)?)),
        }
    }

    fn record_usage(&self, usage: QuotaUsage) -> Result<(), QuotaStoreError> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO quota_usage (user_id, content_type, request_date)
                 VALUES (?1, ?2, ?3)",
                params![
                    id_to_i64(usage.user_id.get())?,
                    usage.content_type.as_str(),
                    format_date(usage.request_date)?,
                ],
            )
            .map_err(SqliteStoreError::from)?;
        Ok(())
    }

    fn prune_usage_before(&self, date: Date) -> Result<u64, QuotaStoreError> {
        let connection = self.lock()?;
        let affected = connection
            .execute(
                "DELETE FROM quota_usage WHERE request_date < ?1",
                params![format_date(date)?],
            )
            .map_err(SqliteStoreError::from)?;
        u64::try_from(affected)
            .map_err(|_| QuotaStoreError::Store("pruned row count overflow".to_string()))
    }
}

// ============================================================================
// SECTION: Approval Store Implementation
// ============================================================================

/// Column list shared by approval queries.
const APPROVAL_COLUMNS: &str = "id, user_id, content_type, content_title, content_key, \
                                content_guids_json, proposed_decision_json, router_rule_id, \
                                triggered_by, approval_reason, status, approved_by, \
                                approval_notes, expires_at, created_at, updated_at";

impl SqliteStore {
    /// Loads one approval request by identifier.
    fn load_approval(
        &self,
        connection: &Connection,
        id: ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, SqliteStoreError> {
        let sql = format!("SELECT {APPROVAL_COLUMNS} FROM approval_requests WHERE id = ?1");
        let raw = connection
            .query_row(&sql, params![id_to_i64(id.get())?], raw_approval_from_row)
            .optional()?;
        match raw {
            None => Ok(None),
            Some(raw) => Ok(Some(approval_from_raw(raw)?)),
        }
    }
}

impl ApprovalStore for SqliteStore {
    fn create(
        &self,
        draft: ApprovalRequestDraft,
        now: OffsetDateTime,
    ) -> Result<ApprovalRequest, ApprovalStoreError> {
        let guids_json = to_json(&draft.content_guids)?;
        let decision_json =
            to_json(&draft.proposed_decision)?;
        let now_text = format_timestamp(now)?;
        let expires_text = draft
            .expires_at
            .map(format_timestamp)
            .transpose()
            ?;
        let router_rule_id = draft
            .router_rule_id
            .map(|id| id_to_i64(id.get()))
            .transpose()
            ?;
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO approval_requests (user_id, content_type, content_title,
                    content_key, content_guids_json, proposed_decision_json, router_rule_id,
                    triggered_by, approval_reason, status, expires_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                params![
                    id_to_i64(draft.user_id.get())?,
                    draft.content_type.as_str(),
                    draft.content_title,
                    draft.content_key,
                    guids_json,
                    decision_json,
                    router_rule_id,
                    trigger_label(draft.triggered_by),
                    draft.approval_reason,
                    ApprovalStatus::Pending.as_str(),
                    expires_text,
                    now_text,
                ],
            )
            .map_err(SqliteStoreError::from)?;
        let id = approval_id_from_rowid(connection.last_insert_rowid())
            ?;
        Ok(ApprovalRequest {
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
        })
    }

    fn get(
        &self,
        id: ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, ApprovalStoreError> {
        let connection = self.lock()?;
        Ok(self.load_approval(&connection, id)?)
    }

    fn list_pending(&self) -> Result<Vec<ApprovalRequest>, ApprovalStoreError> {
        let connection = self.lock()?;
        let sql = format!(
            "SELECT {APPROVAL_COLUMNS} FROM approval_requests
             WHERE status = 'pending' ORDER BY id"
        );
        let mut statement = connection
            .prepare_cached(&sql)
            .map_err(SqliteStoreError::from)?;
        let rows = statement
            .query_map([], raw_approval_from_row)
            .map_err(SqliteStoreError::from)?;
        let mut requests = Vec::new();
        for row in rows {
            let raw = row.map_err(SqliteStoreError::from)?;
            requests.push(approval_from_raw(raw)?);
        }
        Ok(requests)
    }

    fn transition_if_pending(
        &self,
        id: ApprovalRequestId,
        to: ApprovalStatus,
        decided_by: Option<&str>,
        notes: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<TransitionOutcome, ApprovalStoreError> {
        let now_text = format_timestamp(now)?;
        let connection = self.lock()?;
        // The status guard makes concurrent settlers mutually exclusive:
        // exactly one conditional update observes `pending`.
        let affected = connection
            .execute(
                "UPDATE approval_requests
                 SET status = ?2, approved_by = ?3, approval_notes = ?4, updated_at = ?5
                 WHERE id = ?1 AND status = 'pending'",
                params![
                    id_to_i64(id.get())?,
                    to.as_str(),
                    decided_by,
                    notes,
                    now_text,
                ],
            )
            .map_err(SqliteStoreError::from)?;
        let loaded = self.load_approval(&connection, id)?;
        match loaded {
            None => Ok(TransitionOutcome::NotFound),
            Some(request) if affected > 0 => Ok(TransitionOutcome::Applied(request)),
            Some(request) => Ok(TransitionOutcome::AlreadySettled(request.status)),
        }
    }

    fn delete(&self, id: ApprovalRequestId) -> Result<bool, ApprovalStoreError> {
        let connection = self.lock()?;
        let affected = connection
            .execute(
                "DELETE FROM approval_requests WHERE id = ?1",
                params![id_to_i64(id.get())?],
            )
            .map_err(SqliteStoreError::from)?;
        Ok(affected > 0)
    }

    fn expire_due(&self, now: OffsetDateTime) -> Result<u64, ApprovalStoreError> {
        let now_text = format_timestamp(now)?;
        let connection = self.lock()?;
        let affected = connection
            .execute(
                "UPDATE approval_requests
                 SET status = 'expired', updated_at = ?1
                 WHERE status = 'pending' AND expires_at IS NOT NULL AND expires_at <= ?1",
                params![now_text],
            )
            .map_err(SqliteStoreError::from)?;
        u64::try_from(affected)
            .map_err(|_| ApprovalStoreError::Store("expired row count overflow".to_string()))
    }
}

// ============================================================================
// SECTION: Raw Rows
// ============================================================================

/// Rule row as read from `SQLite`, before decoding.
struct RawRule {
    /// Row identifier.
    id: i64,
    /// Rule name.
    name: String,
    /// Family label.
    family: String,
    /// Service label.
    service: String,
    /// Target instance row identifier.
    instance_id: i64,
    /// Quality profile override.
    quality_profile: Option<String>,
    /// Root folder override.
    root_folder: Option<String>,
    /// JSON-encoded tags.
    tags_json: String,
    /// Evaluation priority.
    priority: i32,
    /// Enabled flag.
    enabled: bool,
    /// JSON-encoded criteria.
    criteria_json: String,
    /// Series type label.
    series_type: Option<String>,
    /// Season monitoring label.
    season_monitoring: Option<String>,
    /// Search-on-add override.
    search_on_add: Option<bool>,
    /// Forced-approval flag.
    require_approval: bool,
    /// Forced-approval reason.
    approval_reason: Option<String>,
}

/// Extracts a raw rule from a result row.
fn raw_rule_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRule> {
    Ok(RawRule {
        id: row.get(0)?,
        name: row.get(1)?,
        family: row.get(2)?,
        service: row.get(3)?,
        instance_id: row.get(4)?,
        quality_profile: row.get(5)?,
        root_folder: row.get(6)?,
        tags_json: row.get(7)?,
        priority: row.get(8)?,
        enabled: row.get(9)?,
        criteria_json: row.get(10)?,
        series_type: row.get(11)?,
        season_monitoring: row.get(12)?,
        search_on_add: row.get(13)?,
        require_approval: row.get(14)?,
        approval_reason: row.get(15)?,
    })
}

/// Decodes a raw rule into the core model.
fn rule_from_raw(raw: RawRule) -> Result<RouterRule, SqliteStoreError> {
    Ok(RouterRule {
        id: rule_id_from_rowid(raw.id)?,
        name: raw.name,
        family: parse_family(&raw.family)?,
        service: parse_service(&raw.service)?,
        instance_id: instance_id_from_rowid(raw.instance_id)?,
        quality_profile: raw.quality_profile,
        root_folder: raw.root_folder,
        tags: from_json(&raw.tags_json)?,
        priority: raw.priority,
        enabled: raw.enabled,
        criteria: from_json(&raw.criteria_json)?,
        series_type: raw.series_type.as_deref().map(parse_series_type).transpose()?,
        season_monitoring: raw.season_monitoring,
        search_on_add: raw.search_on_add,
        require_approval: raw.require_approval,
        approval_reason: raw.approval_reason,
    })
}

/// Instance row as read from `SQLite`, before decoding.
struct RawInstance {
    /// Row identifier.
    id: i64,
    /// Display label.
    label: String,
    /// Service label.
    service: String,
    /// Enabled flag.
    enabled: bool,
    /// Default-instance flag.
    is_default: bool,
    /// Default quality profile.
    quality_profile: Option<String>,
    /// Default root folder.
    root_folder: Option<String>,
    /// JSON-encoded tags.
    tags_json: String,
    /// Default search-on-add behavior.
    search_on_add: bool,
    /// Default season monitoring label.
    season_monitoring: Option<String>,
}

/// Extracts a raw instance from a result row.
fn raw_instance_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawInstance> {
    Ok(RawInstance {
        id: row.get(0)?,
        label: row.get(1)?,
        service: row.get(2)?,
        enabled: row.get(3)?,
        is_default: row.get(4)?,
        quality_profile: row.get(5)?,
        root_folder: row.get(6)?,
        tags_json: row.get(7)?,
        search_on_add: row.get(8)?,
        season_monitoring: row.get(9)?,
    })
}

/// Decodes a raw instance into the core model.
fn instance_from_raw(raw: RawInstance) -> Result<InstanceConfig, SqliteStoreError> {
    Ok(InstanceConfig {
        id: instance_id_from_rowid(raw.id)?,
        label: raw.label,
        service: parse_service(&raw.service)?,
        enabled: raw.enabled,
        is_default: raw.is_default,
        quality_profile: raw.quality_profile,
        root_folder: raw.root_folder,
        tags: from_json(&raw.tags_json)?,
        search_on_add: raw.search_on_add,
        season_monitoring: raw.season_monitoring,
    })
}

/// Approval row as read from `SQLite`, before decoding.
struct RawApproval {
    /// Row identifier.
    id: i64,
    /// Requesting user row identifier.
    user_id: i64,
    /// Content type label.
    content_type: String,
    /// Content title.
    content_title: String,
    /// Stable content key.
    content_key: String,
    /// JSON-encoded guids.
    content_guids_json: String,
    /// JSON-encoded proposed decision.
    proposed_decision_json: String,
    /// Forcing rule row identifier.
    router_rule_id: Option<i64>,
    /// Trigger label.
    triggered_by: String,
    /// Deferral reason.
    approval_reason: Option<String>,
    /// Status label.
    status: String,
    /// Settling admin.
    approved_by: Option<String>,
    /// Settling notes.
    approval_notes: Option<String>,
    /// Expiry deadline text.
    expires_at: Option<String>,
    /// Creation timestamp text.
    created_at: String,
    /// Last mutation timestamp text.
    updated_at: String,
}

/// Extracts a raw approval from a result row.
fn raw_approval_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawApproval> {
    Ok(RawApproval {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content_type: row.get(2)?,
        content_title: row.get(3)?,
        content_key: row.get(4)?,
        content_guids_json: row.get(5)?,
        proposed_decision_json: row.get(6)?,
        router_rule_id: row.get(7)?,
        triggered_by: row.get(8)?,
        approval_reason: row.get(9)?,
        status: row.get(10)?,
        approved_by: row.get(11)?,
        approval_notes: row.get(12)?,
        expires_at: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// Decodes a raw approval into the core model.
fn approval_from_raw(raw: RawApproval) -> Result<ApprovalRequest, SqliteStoreError> {
    let guids: Vec<Guid> = from_json(&raw.content_guids_json)?;
    let proposed: RouterDecision = from_json(&raw.proposed_decision_json)?;
    Ok(ApprovalRequest {
        id: approval_id_from_rowid(raw.id)?,
        user_id: user_id_from_rowid(raw.user_id)?,
        content_type: parse_content_type(&raw.content_type)?,
        content_title: raw.content_title,
        content_key: raw.content_key,
        content_guids: guids,
        proposed_decision: proposed,
        router_rule_id: raw.router_rule_id.map(rule_id_from_rowid).transpose()?,
        triggered_by: parse_trigger(&raw.triggered_by)?,
        approval_reason: raw.approval_reason,
        status: ApprovalStatus::from_label(&raw.status).ok_or_else(|| {
            SqliteStoreError::Invalid(format!("unknown approval status: {}", raw.status))
        })?,
        approved_by: raw.approved_by,
        approval_notes: raw.approval_notes,
        expires_at: raw.expires_at.as_deref().map(parse_timestamp).transpose()?,
        created_at: parse_timestamp(&raw.created_at)?,
        updated_at: parse_timestamp(&raw.updated_at)?,
    })
}

// ============================================================================
// SECTION: Encoding Helpers
// ============================================================================

/// Serializes a value to JSON text.
fn to_json<T: serde::Serialize>(value: &T) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Deserializes a value from JSON text.
fn from_json<T: for<'de> serde::Deserialize<'de>>(raw: &str) -> Result<T, SqliteStoreError> {
    serde_json::from_str(raw).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Converts a non-zero identifier into a row id.
fn id_to_i64(raw: u64) -> Result<i64, SqliteStoreError> {
    i64::try_from(raw).map_err(|_| SqliteStoreError::Invalid(format!("id overflow: {raw}")))
}

/// Converts a row id into a rule identifier.
fn rule_id_from_rowid(rowid: i64) -> Result<RuleId, SqliteStoreError> {
    u64::try_from(rowid)
        .ok()
        .and_then(RuleId::from_raw)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("invalid rule rowid: {rowid}")))
}

/// Converts a row id into an instance identifier.
fn instance_id_from_rowid(rowid: i64) -> Result<InstanceId, SqliteStoreError> {
    u64::try_from(rowid)
        .ok()
        .and_then(InstanceId::from_raw)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("invalid instance rowid: {rowid}")))
}

/// Converts a row id into a user identifier.
fn user_id_from_rowid(rowid: i64) -> Result<UserId, SqliteStoreError> {
    u64::try_from(rowid)
        .ok()
        .and_then(UserId::from_raw)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("invalid user rowid: {rowid}")))
}

/// Converts a row id into an approval request identifier.
fn approval_id_from_rowid(rowid: i64) -> Result<ApprovalRequestId, SqliteStoreError> {
    u64::try_from(rowid)
        .ok()
        .and_then(ApprovalRequestId::from_raw)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("invalid approval rowid: {rowid}")))
}

/// Formats a ledger date as `YYYY-MM-DD`.
fn format_date(date: Date) -> Result<String, SqliteStoreError> {
    date.format(&DATE_FORMAT).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Parses a ledger date from `YYYY-MM-DD`.
fn parse_date(raw: &str) -> Result<Date, SqliteStoreError> {
    Date::parse(raw, &DATE_FORMAT)
        .map_err(|_| SqliteStoreError::Invalid(format!("invalid ledger date: {raw}")))
}

/// Formats a timestamp as UTC RFC3339 text (lexicographically ordered).
fn format_timestamp(value: OffsetDateTime) -> Result<String, SqliteStoreError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Parses a timestamp from RFC3339 text.
fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, SqliteStoreError> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|_| SqliteStoreError::Invalid(format!("invalid timestamp: {raw}")))
}

/// Parses a target service label.
fn parse_service(raw: &str) -> Result<TargetService, SqliteStoreError> {
    match raw {
        "radarr" => Ok(TargetService::Radarr),
        "sonarr" => Ok(TargetService::Sonarr),
        _ => Err(SqliteStoreError::Invalid(format!("unknown service: {raw}"))),
    }
}

/// Parses a rule family label.
fn parse_family(raw: &str) -> Result<RuleFamily, SqliteStoreError> {
    match raw {
        "genre" => Ok(RuleFamily::Genre),
        "year" => Ok(RuleFamily::Year),
        "language" => Ok(RuleFamily::Language),
        "certification" => Ok(RuleFamily::Certification),
        "user" => Ok(RuleFamily::User),
        "conditional" => Ok(RuleFamily::Conditional),
        _ => Err(SqliteStoreError::Invalid(format!("unknown rule family: {raw}"))),
    }
}

/// Parses a content type label.
fn parse_content_type(raw: &str) -> Result<ContentType, SqliteStoreError> {
    match raw {
        "movie" => Ok(ContentType::Movie),
        "show" => Ok(ContentType::Show),
        _ => Err(SqliteStoreError::Invalid(format!("unknown content type: {raw}"))),
    }
}

/// Parses a quota type label.
fn parse_quota_type(raw: &str) -> Result<QuotaType, SqliteStoreError> {
    match raw {
        "daily" => Ok(QuotaType::Daily),
        "weekly_rolling" => Ok(QuotaType::WeeklyRolling),
        "monthly" => Ok(QuotaType::Monthly),
        _ => Err(SqliteStoreError::Invalid(format!("unknown quota type: {raw}"))),
    }
}

/// Returns the stable label for a series type.
const fn series_type_label(value: SeriesType) -> &'static str {
    match value {
        SeriesType::Standard => "standard",
        SeriesType::Anime => "anime",
        SeriesType::Daily => "daily",
    }
}

/// Parses a series type label.
fn parse_series_type(raw: &str) -> Result<SeriesType, SqliteStoreError> {
    match raw {
        "standard" => Ok(SeriesType::Standard),
        "anime" => Ok(SeriesType::Anime),
        "daily" => Ok(SeriesType::Daily),
        _ => Err(SqliteStoreError::Invalid(format!("unknown series type: {raw}"))),
    }
}

/// Returns the stable label for an approval trigger.
const fn trigger_label(value: ApprovalTrigger) -> &'static str {
    match value {
        ApprovalTrigger::QuotaExceeded => "quota_exceeded",
        ApprovalTrigger::RouterRule => "router_rule",
        ApprovalTrigger::ManualFlag => "manual_flag",
        ApprovalTrigger::ContentCriteria => "content_criteria",
    }
}

/// Parses an approval trigger label.
fn parse_trigger(raw: &str) -> Result<ApprovalTrigger, SqliteStoreError> {
    match raw {
        "quota_exceeded" => Ok(ApprovalTrigger::QuotaExceeded),
        "router_rule" => Ok(ApprovalTrigger::RouterRule),
        "manual_flag" => Ok(ApprovalTrigger::ManualFlag),
        "content_criteria" => Ok(ApprovalTrigger::ContentCriteria),
        _ => Err(SqliteStoreError::Invalid(format!("unknown approval trigger: {raw}"))),
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Ensures the database file's parent directory exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Opens a connection with the configured pragmas applied.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    connection.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS instances (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    label TEXT NOT NULL,
                    service TEXT NOT NULL,
                    enabled INTEGER NOT NULL,
                    is_default INTEGER NOT NULL,
                    quality_profile TEXT,
                    root_folder TEXT,
                    tags_json TEXT NOT NULL,
                    search_on_add INTEGER NOT NULL,
                    season_monitoring TEXT
                );
                CREATE TABLE IF NOT EXISTS router_rules (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    family TEXT NOT NULL,
                    service TEXT NOT NULL,
                    instance_id INTEGER NOT NULL,
                    quality_profile TEXT,
                    root_folder TEXT,
                    tags_json TEXT NOT NULL,
                    priority INTEGER NOT NULL,
                    enabled INTEGER NOT NULL,
                    criteria_json TEXT NOT NULL,
                    series_type TEXT,
                    season_monitoring TEXT,
                    search_on_add INTEGER,
                    require_approval INTEGER NOT NULL,
                    approval_reason TEXT,
                    FOREIGN KEY (instance_id) REFERENCES instances(id)
                );
                CREATE INDEX IF NOT EXISTS idx_router_rules_family
                    ON router_rules (service, family, enabled);
                CREATE TABLE IF NOT EXISTS user_quotas (
                    user_id INTEGER PRIMARY KEY,
                    quota_type TEXT NOT NULL,
                    quota_limit INTEGER NOT NULL,
                    bypass_approval INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS quota_usage (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    content_type TEXT NOT NULL,
                    request_date TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_quota_usage_user
                    ON quota_usage (user_id, content_type, request_date);
                CREATE TABLE IF NOT EXISTS approval_requests (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    content_type TEXT NOT NULL,
                    content_title TEXT NOT NULL,
                    content_key TEXT NOT NULL,
                    content_guids_json TEXT NOT NULL,
                    proposed_decision_json TEXT NOT NULL,
                    router_rule_id INTEGER,
                    triggered_by TEXT NOT NULL,
                    approval_reason TEXT,
                    status TEXT NOT NULL,
                    approved_by TEXT,
                    approval_notes TEXT,
                    expires_at TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_approval_requests_status
                    ON approval_requests (status, expires_at);",
            )?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}
