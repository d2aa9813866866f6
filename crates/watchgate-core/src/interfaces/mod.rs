// crates/watchgate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Watchgate Interfaces
// Description: Backend-agnostic interfaces for rules, quotas, approvals,
//              metadata lookup, and acquisition dispatch.
// Purpose: Define the contract surfaces used by the Watchgate runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how Watchgate integrates with storage backends and the
//! surrounding acquisition workflow without embedding backend-specific
//! details. Implementations must be deterministic and fail closed on
//! missing or invalid data. Stores are the single source of truth for
//! mutable state; implementations must not cache approval status in
//! process, since multiple instances may mutate it.
//!
//! Security posture: interface implementations consume untrusted inputs
//! (rule payloads, lookup responses) and must validate at the boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::Date;
use time::OffsetDateTime;

use crate::core::AcquisitionCommand;
use crate::core::AcquisitionReceipt;
use crate::core::ApprovalRequest;
use crate::core::ApprovalRequestDraft;
use crate::core::ApprovalRequestId;
use crate::core::ApprovalStatus;
use crate::core::ContentMetadata;
use crate::core::ContentType;
use crate::core::InstanceConfig;
use crate::core::InstanceId;
use crate::core::QuotaUsage;
use crate::core::RouterRule;
use crate::core::RouterRuleDraft;
use crate::core::RuleFamily;
use crate::core::RuleId;
use crate::core::TargetService;
use crate::core::UserId;
use crate::core::UserQuota;

// ============================================================================
// SECTION: Rule Store
// ============================================================================

/// Rule store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RuleStoreError {
    /// Store I/O error.
    #[error("rule store io error: {0}")]
    Io(String),
    /// Stored rule payload is invalid.
    #[error("rule store invalid data: {0}")]
    Invalid(String),
    /// Rule references a missing or mismatched instance.
    #[error("rule references invalid instance: {0}")]
    InstanceReference(String),
    /// Store reported an error.
    #[error("rule store error: {0}")]
    Store(String),
}

/// Read/write access to persisted router rules.
///
/// The engine only reads; `save_rule` serves the admin surface and must
/// validate the criteria payload and instance reference before insert.
pub trait RuleStore: Send + Sync {
    /// Returns enabled rules of one family targeting the given service.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] when loading fails.
    fn rules_by_family(
        &self,
        family: RuleFamily,
        service: TargetService,
    ) -> Result<Vec<RouterRule>, RuleStoreError>;

    /// Returns all enabled rules targeting the given service.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] when loading fails.
    fn enabled_rules(&self, service: TargetService) -> Result<Vec<RouterRule>, RuleStoreError>;

    /// Persists a new rule and returns it with its assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] when validation or persistence fails.
    fn save_rule(&self, draft: RouterRuleDraft) -> Result<RouterRule, RuleStoreError>;

    /// Deletes a rule; returns false when no such rule exists.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] when deletion fails.
    fn delete_rule(&self, rule_id: RuleId) -> Result<bool, RuleStoreError>;

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`RuleStoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), RuleStoreError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Instance Registry
// ============================================================================

/// Instance registry errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum InstanceRegistryError {
    /// Registry I/O error.
    #[error("instance registry io error: {0}")]
    Io(String),
    /// Registry reported an error.
    #[error("instance registry error: {0}")]
    Store(String),
}

/// Read access to configured download-manager instances.
pub trait InstanceRegistry: Send + Sync {
    /// Returns the instance with the given identifier, if configured.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceRegistryError`] when loading fails.
    fn instance(&self, id: InstanceId) -> Result<Option<InstanceConfig>, InstanceRegistryError>;

    /// Returns every enabled instance for the given service.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceRegistryError`] when loading fails.
    fn enabled_instances(
        &self,
        service: TargetService,
    ) -> Result<Vec<InstanceConfig>, InstanceRegistryError>;

    /// Returns the designated default instance for the given service.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceRegistryError`] when loading fails.
    fn default_instance(
        &self,
        service: TargetService,
    ) -> Result<Option<InstanceConfig>, InstanceRegistryError>;
}

// ============================================================================
// SECTION: Quota Store
// ============================================================================

/// Quota store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum QuotaStoreError {
    /// Store I/O error.
    #[error("quota store io error: {0}")]
    Io(String),
    /// Stored quota payload is invalid.
    #[error("quota store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("quota store error: {0}")]
    Store(String),
}

/// Access to quota configuration and the append-only usage ledger.
pub trait QuotaStore: Send + Sync {
    /// Returns the quota configured for a user, if any.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaStoreError`] when loading fails.
    fn user_quota(&self, user_id: UserId) -> Result<Option<UserQuota>, QuotaStoreError>;

    /// Counts usage rows for a user/content-type within `[from, to]`
    /// (bounds inclusive).
    ///
    /// # Errors
    ///
    /// Returns [`QuotaStoreError`] when counting fails.
    fn usage_count_between(
        &self,
        user_id: UserId,
        content_type: ContentType,
        from: Date,
        to: Date,
    ) -> Result<u64, QuotaStoreError>;

    /// Returns the oldest usage date for a user/content-type within
    /// `[from, to]` (bounds inclusive), if any row exists.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaStoreError`] when loading fails.
    fn oldest_usage_between(
        &self,
        user_id: UserId,
        content_type: ContentType,
        from: Date,
        to: Date,
    ) -> Result<Option<Date>, QuotaStoreError>;

    /// Appends one usage row to the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaStoreError`] when the write fails; callers must not
    /// treat a failed write as recorded.
    fn record_usage(&self, usage: QuotaUsage) -> Result<(), QuotaStoreError>;

    /// Removes ledger rows older than the given date (retention sweep).
    ///
    /// # Errors
    ///
    /// Returns [`QuotaStoreError`] when the sweep fails.
    fn prune_usage_before(&self, date: Date) -> Result<u64, QuotaStoreError>;
}

// ============================================================================
// SECTION: Approval Store
// ============================================================================

/// Approval store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ApprovalStoreError {
    /// Store I/O error.
    #[error("approval store io error: {0}")]
    Io(String),
    /// Stored approval payload is invalid.
    #[error("approval store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("approval store error: {0}")]
    Store(String),
}

/// Outcome of a conditional status transition.
///
/// # Invariants
/// - `Applied` is returned at most once per request lifetime; the store
///   guarantees mutual exclusion between concurrent settlers.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The request moved out of `pending`; the updated record is returned.
    Applied(ApprovalRequest),
    /// The request was already settled; the current status is returned.
    AlreadySettled(ApprovalStatus),
    /// No request with the given identifier exists.
    NotFound,
}

/// Access to persisted approval requests.
///
/// Implementations must perform `transition_if_pending` as an atomic
/// conditional write (transition only if status is still `pending`) so
/// concurrent admins and the expiry sweep serialize without in-process
/// locks.
pub trait ApprovalStore: Send + Sync {
    /// Persists a new pending request and returns it with its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalStoreError`] when persistence fails.
    fn create(
        &self,
        draft: ApprovalRequestDraft,
        now: OffsetDateTime,
    ) -> Result<ApprovalRequest, ApprovalStoreError>;

    /// Returns the request with the given identifier, if present.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalStoreError`] when loading fails.
    fn get(
        &self,
        id: ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, ApprovalStoreError>;

    /// Lists pending requests, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalStoreError`] when listing fails.
    fn list_pending(&self) -> Result<Vec<ApprovalRequest>, ApprovalStoreError>;

    /// Atomically settles a request if and only if it is still pending.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalStoreError`] when the write fails.
    fn transition_if_pending(
        &self,
        id: ApprovalRequestId,
        to: ApprovalStatus,
        decided_by: Option<&str>,
        notes: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<TransitionOutcome, ApprovalStoreError>;

    /// Permanently removes a request; returns false when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalStoreError`] when deletion fails.
    fn delete(&self, id: ApprovalRequestId) -> Result<bool, ApprovalStoreError>;

    /// Expires every pending request whose deadline has passed; returns the
    /// number of requests settled.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalStoreError`] when the sweep fails.
    fn expire_due(&self, now: OffsetDateTime) -> Result<u64, ApprovalStoreError>;
}

// ============================================================================
// SECTION: Metadata Lookup
// ============================================================================

/// Metadata lookup errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling; evaluators absorb them
///   as "no metadata available".
#[derive(Debug, Error)]
pub enum LookupError {
    /// Request construction or transport failed.
    #[error("lookup transport error: {0}")]
    Transport(String),
    /// The endpoint answered with a non-success status.
    #[error("lookup endpoint status {status}")]
    Status {
        /// HTTP status code returned by the endpoint.
        status: u16,
    },
    /// The response body was malformed or exceeded limits.
    #[error("lookup response invalid: {0}")]
    InvalidResponse(String),
}

/// Lookup into the download managers' own metadata endpoints.
pub trait MetadataLookup: Send + Sync {
    /// Resolves movie metadata by TMDB identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the lookup fails; `Ok(None)` means the
    /// endpoint knows no such content.
    fn movie_by_tmdb(&self, tmdb_id: u64) -> Result<Option<ContentMetadata>, LookupError>;

    /// Resolves series metadata by TVDB identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the lookup fails; `Ok(None)` means the
    /// endpoint knows no such content.
    fn series_by_tvdb(&self, tvdb_id: u64) -> Result<Option<ContentMetadata>, LookupError>;
}

// ============================================================================
// SECTION: Acquisition Dispatcher
// ============================================================================

/// Dispatch errors for acquisition commands.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The acquisition workflow rejected or failed the command.
    #[error("acquisition dispatch failed: {0}")]
    DispatchFailed(String),
}

/// Acquisition workflow responsible for executing routing decisions.
pub trait AcquisitionDispatcher: Send + Sync {
    /// Issues one acquisition command to the target instance.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when dispatch fails; no receipt is
    /// returned for failed commands.
    fn dispatch(&self, command: &AcquisitionCommand) -> Result<AcquisitionReceipt, DispatchError>;
}
