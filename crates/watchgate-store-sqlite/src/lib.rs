// crates/watchgate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Watchgate SQLite Store
// Description: Durable store implementations backed by SQLite.
// Purpose: Persist rules, instances, quotas, and approval requests with
//          conditional status transitions.
// Dependencies: rusqlite, serde, serde_json, thiserror, time, watchgate-core
// ============================================================================

//! ## Overview
//! This crate implements every Watchgate store interface on `SQLite`. The
//! approval transition is a single conditional `UPDATE ... WHERE status =
//! 'pending'`, which serializes concurrent admin actions and the expiry
//! sweep without in-process locks, so multiple service instances can share
//! one database file safely.

/// Store implementation.
pub mod store;

pub use store::InstanceDraft;
pub use store::SCHEMA_VERSION;
pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
