// navigator-core/src/checkpoint.rs
// ============================================================================
// Module: Checkpoint Data Model
// Description: Per-year checkpoint schema and integrity hashing.
// Purpose: Define what a checkpoint records and how its integrity hash is
//          derived; persistence lives in `navigator-store-sqlite`.
// Dependencies: serde, crate::hashing
// ============================================================================

//! ## Overview
//! A checkpoint is a durable, integrity-hashed record of a completed year.
//! The hash covers `database_state` and `validation_data` only — not the
//! timestamp or run id — so that recomputing it on load is a pure function
//! of the same canonical JSON the writer hashed.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::hashing::HashDigest;
use crate::hashing::hash_canonical_json;
use crate::identifiers::RunId;
use crate::identifiers::SimulationYear;

/// Per-table row counts and lightweight data-quality probes for a year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseState {
    /// Row counts per tracked table.
    pub table_counts: BTreeMap<String, u64>,
    /// Simple data-quality metrics, e.g. `"null_compensation_rate"`.
    pub data_quality_metrics: BTreeMap<String, f64>,
}

/// Event-type histogram and aggregate sums used to detect drift between
/// runs of the same configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationData {
    /// Count of events produced per event type this year.
    pub event_distribution: BTreeMap<String, u64>,
    /// Sum of `current_compensation` across active employees.
    pub total_compensation: f64,
    /// Sum of all contribution events' amounts.
    pub total_contributions: f64,
}

/// The hashed portion of a checkpoint, used to compute and verify
/// `integrity_hash`.
#[derive(Debug, Clone, Serialize)]
struct HashedPayload<'a> {
    database_state: &'a DatabaseState,
    validation_data: &'a ValidationData,
}

/// A durable, integrity-hashed record of a completed year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Year this checkpoint covers.
    pub year: SimulationYear,
    /// Run that produced this checkpoint.
    pub run_id: RunId,
    /// Hash of the configuration in effect when this checkpoint was written.
    pub config_hash: String,
    /// Row counts and quality probes.
    pub database_state: DatabaseState,
    /// Event histograms and aggregate sums.
    pub validation_data: ValidationData,
    /// SHA-256 over the canonicalized `{database_state, validation_data}`.
    pub integrity_hash: HashDigest,
    /// Unix-millis timestamp the checkpoint was written.
    pub timestamp: i64,
}

impl Checkpoint {
    /// Builds a checkpoint, computing its integrity hash from the given
    /// state.
    ///
    /// # Errors
    ///
    /// Returns a canonicalization error if either argument fails to
    /// serialize, which cannot happen for these plain-data types but is
    /// propagated rather than assumed away.
    pub fn new(
        year: SimulationYear,
        run_id: RunId,
        config_hash: String,
        database_state: DatabaseState,
        validation_data: ValidationData,
        timestamp: i64,
    ) -> Result<Self, crate::hashing::HashError> {
        let integrity_hash = hash_canonical_json(&HashedPayload {
            database_state: &database_state,
            validation_data: &validation_data,
        })?;
        Ok(Self {
            year,
            run_id,
            config_hash,
            database_state,
            validation_data,
            integrity_hash,
            timestamp,
        })
    }

    /// Recomputes the integrity hash from the checkpoint's own state and
    /// reports whether it matches the stored value.
    #[must_use]
    pub fn integrity_holds(&self) -> bool {
        let recomputed = hash_canonical_json(&HashedPayload {
            database_state: &self.database_state,
            validation_data: &self.validation_data,
        });
        recomputed.is_ok_and(|digest| digest == self.integrity_hash)
    }
}

/// A lightweight, in-memory marker of the last stage a year reached,
/// persisted as a JSON sidecar for legacy resume compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCheckpoint {
    /// Year the stage checkpoint covers.
    pub year: SimulationYear,
    /// Name of the final stage reached.
    pub stage: String,
    /// Unix-millis timestamp the stage checkpoint was written.
    pub timestamp: i64,
    /// Lightweight hash of the stage's observable state.
    pub state_hash: HashDigest,
}
