// crates/watchgate-core/src/core/content.rs
// ============================================================================
// Module: Watchgate Content Model
// Description: Content items, typed external identifiers, and routing context.
// Purpose: Provide immutable evaluation inputs produced by the watchlist and
//          webhook ingestion pipeline.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! Content items are immutable snapshots passed into evaluation; the engine
//! never mutates them. Metadata enrichment produces a new value instead of
//! updating in place so repeated resolution stays deterministic.
//!
//! Security posture: titles, genres, and identifiers originate from external
//! metadata providers and are treated as untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::UserId;

// ============================================================================
// SECTION: Content Type
// ============================================================================

/// Content type of a watchlist item.
///
/// # Invariants
/// - Variants are stable for serialization and quota accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// A movie, acquired through a Radarr instance.
    Movie,
    /// A series, acquired through a Sonarr instance.
    Show,
}

impl ContentType {
    /// Returns the stable wire label for the content type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Show => "show",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Typed External Identifiers
// ============================================================================

/// Typed external content identifier, e.g. `tmdb:123` or `tvdb:456`.
///
/// # Invariants
/// - `provider` and `value` are non-empty and contain no `:` separator
///   ambiguity (`value` may contain `:`; `provider` may not).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Guid {
    /// Lowercase provider prefix (`tmdb`, `tvdb`, `imdb`, ...).
    provider: String,
    /// Provider-scoped identifier value.
    value: String,
}

impl Guid {
    /// Creates a guid from a provider prefix and value.
    ///
    /// Returns `None` when either part is empty or the provider contains a
    /// `:` separator.
    #[must_use]
    pub fn new(provider: &str, value: &str) -> Option<Self> {
        if provider.is_empty() || value.is_empty() || provider.contains(':') {
            return None;
        }
        Some(Self {
            provider: provider.to_ascii_lowercase(),
            value: value.to_string(),
        })
    }

    /// Parses a guid from its `provider:value` wire form.
    ///
    /// # Errors
    ///
    /// Returns [`GuidParseError`] when the input has no separator or an empty
    /// part.
    pub fn parse(raw: &str) -> Result<Self, GuidParseError> {
        let (provider, value) = raw.split_once(':').ok_or_else(|| GuidParseError {
            raw: raw.to_string(),
        })?;
        Self::new(provider, value).ok_or_else(|| GuidParseError {
            raw: raw.to_string(),
        })
    }

    /// Returns the provider prefix.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Returns the provider-scoped value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the numeric value when the guid carries one.
    #[must_use]
    pub fn numeric_value(&self) -> Option<u64> {
        self.value.parse().ok()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.value)
    }
}

impl TryFrom<String> for Guid {
    type Error = GuidParseError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<Guid> for String {
    fn from(guid: Guid) -> Self {
        guid.to_string()
    }
}

/// Error produced when a guid wire form cannot be parsed.
///
/// # Invariants
/// - `raw` echoes the rejected input for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid guid: {raw}")]
pub struct GuidParseError {
    /// The rejected wire form.
    pub raw: String,
}

// ============================================================================
// SECTION: Content Metadata
// ============================================================================

/// Provider-sourced metadata attached to a content item.
///
/// # Invariants
/// - Fields are snapshots from a lookup endpoint; absence means the value
///   was not available, not that it is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMetadata {
    /// Release year of the content.
    pub year: Option<i32>,
    /// Original language name (e.g. `English`, `Japanese`).
    pub original_language: Option<String>,
    /// Certification label (e.g. `PG-13`, `TV-MA`).
    pub certification: Option<String>,
}

impl ContentMetadata {
    /// Returns true when no field carries a value.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.year.is_none() && self.original_language.is_none() && self.certification.is_none()
    }
}

// ============================================================================
// SECTION: Content Item
// ============================================================================

/// Immutable watchlist item snapshot passed into evaluation.
///
/// # Invariants
/// - `guids` is ordered and deduplicated by the constructor.
/// - The engine never mutates a content item; enrichment clones it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Display title of the content.
    pub title: String,
    /// Ordered set of typed external identifiers.
    pub guids: Vec<Guid>,
    /// Genre labels as reported by the watchlist provider.
    pub genres: Vec<String>,
    /// Optional provider-sourced lookup metadata.
    pub metadata: Option<ContentMetadata>,
}

impl ContentItem {
    /// Creates a content item, deduplicating guids while preserving order.
    #[must_use]
    pub fn new(title: impl Into<String>, guids: Vec<Guid>, genres: Vec<String>) -> Self {
        let mut unique = Vec::with_capacity(guids.len());
        for guid in guids {
            if !unique.contains(&guid) {
                unique.push(guid);
            }
        }
        Self {
            title: title.into(),
            guids: unique,
            genres,
            metadata: None,
        }
    }

    /// Returns a copy of this item carrying the provided metadata.
    #[must_use]
    pub fn with_metadata(&self, metadata: ContentMetadata) -> Self {
        let mut item = self.clone();
        item.metadata = Some(metadata);
        item
    }

    /// Returns the first guid with the given provider prefix.
    #[must_use]
    pub fn guid_for(&self, provider: &str) -> Option<&Guid> {
        self.guids.iter().find(|guid| guid.provider() == provider)
    }
}

// ============================================================================
// SECTION: Routing Context
// ============================================================================

/// A user attributed to a watchlist request.
///
/// # Invariants
/// - At least one of `id` and `name` is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttribution {
    /// Numeric user identifier, when known.
    pub id: Option<UserId>,
    /// Username, when known.
    pub name: Option<String>,
}

impl UserAttribution {
    /// Creates an attribution from a numeric user identifier.
    #[must_use]
    pub const fn from_id(id: UserId) -> Self {
        Self {
            id: Some(id),
            name: None,
        }
    }

    /// Creates an attribution from a username.
    #[must_use]
    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }
}

/// Read-only routing context constructed by the ingestion pipeline.
///
/// # Invariants
/// - `users` may be empty (system-originated events) or carry multiple
///   attributions when several users watchlisted the same item.
/// - The engine never mutates a routing context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingContext {
    /// Content type being routed.
    pub content_type: ContentType,
    /// Users attributed to the request, primary attribution first.
    #[serde(default)]
    pub users: Vec<UserAttribution>,
    /// Producer hint that this request must be approved by an admin
    /// regardless of quota state.
    #[serde(default)]
    pub manual_approval_required: bool,
}

impl RoutingContext {
    /// Creates a context with no user attribution.
    #[must_use]
    pub const fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            users: Vec::new(),
            manual_approval_required: false,
        }
    }

    /// Returns the primary attributed user identifier, if any.
    #[must_use]
    pub fn primary_user_id(&self) -> Option<UserId> {
        self.users.iter().find_map(|user| user.id)
    }

    /// Returns the primary attributed username, if any.
    #[must_use]
    pub fn primary_user_name(&self) -> Option<&str> {
        self.users.iter().find_map(|user| user.name.as_deref())
    }
}
