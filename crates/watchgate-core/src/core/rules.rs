// crates/watchgate-core/src/core/rules.rs
// ============================================================================
// Module: Watchgate Router Rules
// Description: Admin-authored routing rules, criteria shorthands, and
//              instance configuration.
// Purpose: Model the persisted rule set the decision engine reads per
//          evaluation.
// Dependencies: crate::core::{condition, content, identifiers}, serde
// ============================================================================

//! ## Overview
//! Router rules pair a matching criterion with a target instance and the
//! per-instance configuration to apply on match. Rules are authored through
//! the admin surface, persisted by a rule store, and read-only to the
//! engine. Each rule belongs to one evaluator family; the criteria payload
//! is the family-specific shorthand, with the conditional family carrying a
//! full condition tree.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::condition::ConditionNode;
use crate::core::condition::ConditionOperator;
use crate::core::condition::NumberRange;
use crate::core::content::ContentType;
use crate::core::identifiers::InstanceId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::UserId;

// ============================================================================
// SECTION: Target Service
// ============================================================================

/// Download-manager service a rule or instance targets.
///
/// # Invariants
/// - Variants are stable for serialization and map 1:1 to content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetService {
    /// Radarr, acquiring movies.
    Radarr,
    /// Sonarr, acquiring series.
    Sonarr,
}

impl TargetService {
    /// Returns the service responsible for the given content type.
    #[must_use]
    pub const fn for_content_type(content_type: ContentType) -> Self {
        match content_type {
            ContentType::Movie => Self::Radarr,
            ContentType::Show => Self::Sonarr,
        }
    }

    /// Returns the stable wire label for the service.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Radarr => "radarr",
            Self::Sonarr => "sonarr",
        }
    }
}

impl fmt::Display for TargetService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Rule Families
// ============================================================================

/// Evaluator family a rule belongs to.
///
/// # Invariants
/// - Variants are stable for serialization and registry lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFamily {
    /// Genre set matching.
    Genre,
    /// Release-year matching (lookup-backed).
    Year,
    /// Original-language matching (lookup-backed).
    Language,
    /// Certification matching.
    Certification,
    /// Requesting-user matching.
    User,
    /// Condition-tree matching composing the other families.
    Conditional,
}

impl RuleFamily {
    /// Returns the stable wire label for the family.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Genre => "genre",
            Self::Year => "year",
            Self::Language => "language",
            Self::Certification => "certification",
            Self::User => "user",
            Self::Conditional => "conditional",
        }
    }

    /// All families, in registry declaration order.
    pub const ALL: [Self; 6] =
        [Self::Conditional, Self::User, Self::Language, Self::Year, Self::Certification, Self::Genre];
}

impl fmt::Display for RuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Criteria Shorthands
// ============================================================================

/// Year criterion shorthand for year-family rules.
///
/// # Invariants
/// - The untagged wire form distinguishes variants by JSON shape: number,
///   array, or `{min,max}` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YearCriterion {
    /// Exact year match.
    Exact(i32),
    /// Match any listed year.
    List(Vec<i32>),
    /// Inclusive year range with optional open bounds.
    Range(NumberRange),
}

impl YearCriterion {
    /// Returns true when the year satisfies the criterion.
    #[must_use]
    pub fn matches(&self, year: i32) -> bool {
        match self {
            Self::Exact(expected) => year == *expected,
            Self::List(years) => years.contains(&year),
            Self::Range(range) => range.contains(i64::from(year)),
        }
    }
}

/// User criterion shorthand for user-family rules.
///
/// # Invariants
/// - A rule matches when any attributed user id or name matches; an empty
///   criterion matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCriterion {
    /// Matching numeric user identifiers.
    #[serde(default)]
    pub ids: Vec<UserId>,
    /// Matching usernames (case-sensitive, as stored).
    #[serde(default)]
    pub names: Vec<String>,
}

/// Family-specific criteria payload of a router rule.
///
/// # Invariants
/// - The variant must agree with the rule's declared family; stores reject
///   mismatches at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCriteria {
    /// Genre shorthand: labels plus a containment operator.
    Genre {
        /// Genre labels to match (normalized before comparison).
        genres: Vec<String>,
        /// Containment operator; defaults to any-overlap.
        #[serde(default = "default_genre_operator")]
        operator: ConditionOperator,
    },
    /// Year shorthand.
    Year {
        /// Year criterion.
        year: YearCriterion,
    },
    /// Original-language shorthand: any listed language matches.
    Language {
        /// Language names, compared case-insensitively.
        languages: Vec<String>,
    },
    /// Certification shorthand: labels plus a comparison operator.
    Certification {
        /// Certification labels, compared case-insensitively.
        values: Vec<String>,
        /// Comparison operator; defaults to membership.
        #[serde(default = "default_certification_operator")]
        operator: ConditionOperator,
    },
    /// Requesting-user shorthand.
    User {
        /// User criterion.
        users: UserCriterion,
    },
    /// Conditional family: one top-level condition tree.
    Condition {
        /// Root of the condition tree.
        root: ConditionNode,
    },
}

/// Default operator for genre shorthands.
const fn default_genre_operator() -> ConditionOperator {
    ConditionOperator::In
}

/// Default operator for certification shorthands.
const fn default_certification_operator() -> ConditionOperator {
    ConditionOperator::In
}

impl RuleCriteria {
    /// Returns the family this criteria payload belongs to.
    #[must_use]
    pub const fn family(&self) -> RuleFamily {
        match self {
            Self::Genre {
                ..
            } => RuleFamily::Genre,
            Self::Year {
                ..
            } => RuleFamily::Year,
            Self::Language {
                ..
            } => RuleFamily::Language,
            Self::Certification {
                ..
            } => RuleFamily::Certification,
            Self::User {
                ..
            } => RuleFamily::User,
            Self::Condition {
                ..
            } => RuleFamily::Conditional,
        }
    }
}

// ============================================================================
// SECTION: Series Overrides
// ============================================================================

/// Series type override applied when routing to Sonarr.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesType {
    /// Standard episode numbering.
    Standard,
    /// Absolute episode numbering.
    Anime,
    /// Date-based episode numbering.
    Daily,
}

// ============================================================================
// SECTION: Router Rules
// ============================================================================

/// Admin-authored routing rule read by the decision engine.
///
/// # Invariants
/// - `instance_id` references an instance whose service equals `service`.
/// - `criteria.family()` equals `family`.
/// - Higher `priority` wins same-instance conflicts; ties break on lower id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterRule {
    /// Rule identifier assigned by the store.
    pub id: RuleId,
    /// Display name for the admin surface.
    pub name: String,
    /// Evaluator family.
    pub family: RuleFamily,
    /// Target service.
    pub service: TargetService,
    /// Target instance identifier.
    pub instance_id: InstanceId,
    /// Quality profile override; `None` falls back to the instance default.
    pub quality_profile: Option<String>,
    /// Root folder override; `None` falls back to the instance default.
    pub root_folder: Option<String>,
    /// Tags applied on acquisition.
    pub tags: Vec<String>,
    /// Evaluation priority; higher values win conflicts.
    pub priority: i32,
    /// Whether the rule participates in evaluation.
    pub enabled: bool,
    /// Family-specific matching criteria.
    pub criteria: RuleCriteria,
    /// Series type override (Sonarr targets only).
    pub series_type: Option<SeriesType>,
    /// Season monitoring override (opaque Sonarr monitor label).
    pub season_monitoring: Option<String>,
    /// Search-on-add override.
    pub search_on_add: Option<bool>,
    /// Force the approval path for content matched by this rule.
    #[serde(default)]
    pub require_approval: bool,
    /// Reason shown with rule-forced approval requests.
    pub approval_reason: Option<String>,
}

/// Rule payload submitted to a store for persistence.
///
/// # Invariants
/// - Field semantics match [`RouterRule`]; the store assigns the identifier
///   and validates criteria/instance references before insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterRuleDraft {
    /// Display name for the admin surface.
    pub name: String,
    /// Target service.
    pub service: TargetService,
    /// Target instance identifier.
    pub instance_id: InstanceId,
    /// Quality profile override.
    pub quality_profile: Option<String>,
    /// Root folder override.
    pub root_folder: Option<String>,
    /// Tags applied on acquisition.
    pub tags: Vec<String>,
    /// Evaluation priority; higher values win conflicts.
    pub priority: i32,
    /// Whether the rule participates in evaluation.
    pub enabled: bool,
    /// Family-specific matching criteria.
    pub criteria: RuleCriteria,
    /// Series type override (Sonarr targets only).
    pub series_type: Option<SeriesType>,
    /// Season monitoring override.
    pub season_monitoring: Option<String>,
    /// Search-on-add override.
    pub search_on_add: Option<bool>,
    /// Force the approval path for content matched by this rule.
    #[serde(default)]
    pub require_approval: bool,
    /// Reason shown with rule-forced approval requests.
    pub approval_reason: Option<String>,
}

// ============================================================================
// SECTION: Instance Configuration
// ============================================================================

/// Configured download-manager instance.
///
/// # Invariants
/// - At most one enabled instance per service carries `is_default = true`.
/// - Disabled instances never receive routing decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Instance identifier assigned by the store.
    pub id: InstanceId,
    /// Display label for the admin surface.
    pub label: String,
    /// Service this instance runs.
    pub service: TargetService,
    /// Whether the instance may receive content.
    pub enabled: bool,
    /// Whether this instance is the fallback target for its service.
    pub is_default: bool,
    /// Default quality profile applied when no rule overrides it.
    pub quality_profile: Option<String>,
    /// Default root folder applied when no rule overrides it.
    pub root_folder: Option<String>,
    /// Default tags applied when no rule overrides them.
    pub tags: Vec<String>,
    /// Default search-on-add behavior.
    pub search_on_add: bool,
    /// Default season monitoring label (Sonarr only).
    pub season_monitoring: Option<String>,
}
