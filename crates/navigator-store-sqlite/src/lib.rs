// navigator-store-sqlite/src/lib.rs
// ============================================================================
// Module: Navigator SQLite Store Library
// Description: Public API surface for the analytical store.
// Purpose: Expose the store, its configuration, and recovery planning.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! The analytical store is the single writer for per-year workforce
//! snapshots, events, registries, and checkpoints. Every mutating call goes
//! through one guarded connection so the pipeline's single-writer discipline
//! holds even when callers are running on separate threads.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::AnalyticalStore;
pub use store::RecoveryPlan;
pub use store::RecoveryReason;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::StoreError;
pub use store::unix_millis;
