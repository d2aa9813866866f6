// crates/watchgate-lookup/src/client.rs
// ============================================================================
// Module: Lookup Client
// Description: Blocking HTTP client for Radarr/Sonarr lookup endpoints.
// Purpose: Resolve a GUID to content metadata under strict transport
//          limits.
// Dependencies: watchgate-core, reqwest, serde, serde_json, url
// ============================================================================

//! ## Overview
//! The client issues bounded GET requests to `/api/v3/movie/lookup` and
//! `/api/v3/series/lookup`, authenticated with the instance API key. The
//! first result of a lookup supplies the year, original language, and
//! certification; an empty result array means the endpoint knows no such
//! content. Response bodies are read under a hard byte limit and redirects
//! are never followed.
//!
//! Security posture: lookup responses are untrusted; oversized, truncated,
//! or malformed bodies fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use serde::Deserialize;
use url::Url;
use watchgate_core::ContentMetadata;
use watchgate_core::interfaces::LookupError;
use watchgate_core::interfaces::MetadataLookup;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the lookup client.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` base URLs.
/// - `max_response_bytes` is enforced as a hard upper bound on bodies.
/// - `timeout_ms` applies to the full request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LookupClientConfig {
    /// Base URL of the download-manager instance.
    pub base_url: String,
    /// API key sent as `X-Api-Key`.
    pub api_key: String,
    /// Allow cleartext HTTP (disabled by default).
    #[serde(default)]
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// User agent string for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Returns the default request timeout.
const fn default_timeout_ms() -> u64 {
    5_000
}

/// Returns the default response size limit.
const fn default_max_response_bytes() -> usize {
    1024 * 1024
}

/// Returns the default user agent.
fn default_user_agent() -> String {
    "watchgate/0.1".to_string()
}

// ============================================================================
// SECTION: Response Shapes
// ============================================================================

/// Original-language object as returned by lookup endpoints.
#[derive(Debug, Deserialize)]
struct LookupLanguage {
    /// Language name (e.g. `English`).
    name: Option<String>,
}

/// One lookup result entry; only the fields the engine needs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupEntry {
    /// Release year.
    year: Option<i32>,
    /// Original-language object.
    original_language: Option<LookupLanguage>,
    /// Certification label.
    certification: Option<String>,
}

impl LookupEntry {
    /// Converts the entry into engine metadata.
    fn into_metadata(self) -> ContentMetadata {
        ContentMetadata {
            year: self.year,
            original_language: self.original_language.and_then(|language| language.name),
            certification: self.certification,
        }
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Blocking lookup client for one download-manager instance.
///
/// # Invariants
/// - Redirects are not followed.
/// - Responses exceeding configured limits fail closed.
pub struct LookupClient {
    /// Client configuration, including limits.
    config: LookupClientConfig,
    /// Validated base URL.
    base_url: Url,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl LookupClient {
    /// Creates a lookup client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the base URL is invalid, uses a blocked
    /// scheme, or the HTTP client cannot be created.
    pub fn new(config: LookupClientConfig) -> Result<Self, LookupError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|_| LookupError::Transport("invalid base url".to_string()))?;
        match base_url.scheme() {
            "https" => {}
            "http" if config.allow_http => {}
            _ => return Err(LookupError::Transport("unsupported url scheme".to_string())),
        }
        if !base_url.username().is_empty() || base_url.password().is_some() {
            return Err(LookupError::Transport("url credentials are not allowed".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|_| LookupError::Transport("http client build failed".to_string()))?;
        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    /// Performs one lookup request and decodes the first result entry.
    fn lookup(&self, path: &str, term: &str) -> Result<Option<ContentMetadata>, LookupError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|_| LookupError::Transport("invalid lookup path".to_string()))?;
        url.query_pairs_mut().append_pair("term", term);

        let response = self
            .client
            .get(url.as_str())
            .header("X-Api-Key", &self.config.api_key)
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    LookupError::Transport("lookup request timed out".to_string())
                } else {
                    LookupError::Transport("lookup request failed".to_string())
                }
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                status: status.as_u16(),
            });
        }
        let body = read_response_limited(response, self.config.max_response_bytes)?;
        let entries: Vec<LookupEntry> = serde_json::from_slice(&body)
            .map_err(|err| LookupError::InvalidResponse(err.to_string()))?;
        Ok(entries.into_iter().next().map(LookupEntry::into_metadata))
    }
}

impl MetadataLookup for LookupClient {
    fn movie_by_tmdb(&self, tmdb_id: u64) -> Result<Option<ContentMetadata>, LookupError> {
        self.lookup("api/v3/movie/lookup", &format!("tmdb:{tmdb_id}"))
    }

    fn series_by_tvdb(&self, tvdb_id: u64) -> Result<Option<ContentMetadata>, LookupError> {
        self.lookup("api/v3/series/lookup", &format!("tvdb:{tvdb_id}"))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(response: Response, max_bytes: usize) -> Result<Vec<u8>, LookupError> {
    let expected_len = response.content_length();
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| LookupError::InvalidResponse("size limit exceeds u64".to_string()))?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(LookupError::InvalidResponse("response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    let limit = max_bytes_u64.saturating_add(1);
    let mut handle = response.take(limit);
    handle
        .read_to_end(&mut buf)
        .map_err(|_| LookupError::Transport("failed to read response".to_string()))?;
    if buf.len() > max_bytes {
        return Err(LookupError::InvalidResponse("response exceeds size limit".to_string()));
    }
    if let Some(expected) = expected_len {
        let expected = usize::try_from(expected)
            .map_err(|_| LookupError::InvalidResponse("invalid response length".to_string()))?;
        if buf.len() < expected {
            return Err(LookupError::InvalidResponse("response truncated".to_string()));
        }
    }
    Ok(buf)
}
