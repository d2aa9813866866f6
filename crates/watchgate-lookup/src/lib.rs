// crates/watchgate-lookup/src/lib.rs
// ============================================================================
// Module: Watchgate Lookup
// Description: Metadata lookup client for download-manager endpoints.
// Purpose: Resolve GUIDs to year, language, and certification metadata with
//          strict transport limits.
// Dependencies: reqwest, serde, serde_json, thiserror, tracing, url,
//               watchgate-core
// ============================================================================

//! ## Overview
//! This crate implements the [`watchgate_core::interfaces::MetadataLookup`]
//! interface against the download managers' own lookup endpoints. Requests
//! are bounded (timeout, response size), redirects are disabled, and
//! cleartext HTTP is opt-in, preserving fail-closed behavior: any transport
//! trouble surfaces as a [`watchgate_core::interfaces::LookupError`] the
//! evaluators absorb as "no metadata".

/// Lookup client implementation.
pub mod client;

pub use client::LookupClient;
pub use client::LookupClientConfig;
