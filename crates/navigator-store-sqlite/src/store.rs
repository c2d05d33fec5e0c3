// navigator-store-sqlite/src/store.rs
// ============================================================================
// Module: Analytical Store
// Description: Durable SQLite-backed store for snapshots, events, registries,
//          and checkpoints.
// Purpose: Give the pipeline a single writer with retry-on-busy semantics
//          and a checkpoint-driven recovery planner.
// Dependencies: navigator-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! One guarded connection backs the whole store; every mutating call goes
//! through [`AnalyticalStore::execute_with_retry`], which retries on
//! `SQLITE_BUSY` instead of failing the year outright. Checkpoints are
//! stored as gzip-compressed canonical JSON blobs with their own embedded
//! integrity hash, so recovery planning never has to trust the row that
//! held them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use navigator_core::Checkpoint;
use navigator_core::DeferralEscalationRegistryEntry;
use navigator_core::EmployeeId;
use navigator_core::EnrollmentRegistryEntry;
use navigator_core::HashDigest;
use navigator_core::SequencePoint;
use navigator_core::SimulationYear;
use navigator_core::StageCheckpoint;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current schema version for the analytical store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout, in milliseconds, before `execute_with_retry` gives up.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Number of retry attempts `execute_with_retry` makes on `SQLITE_BUSY`.
const MAX_BUSY_RETRIES: u32 = 5;
/// Backoff between retries, in milliseconds.
const RETRY_BACKOFF_MS: u64 = 50;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended for a single-writer, multi-reader store).
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

/// `SQLite` sync mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced, safe under WAL).
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

/// Configuration for the analytical store.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    pub sync_mode: SqliteSyncMode,
    /// Number of most recent checkpoints to retain per year; older ones are
    /// pruned on `keep_latest_checkpoints`.
    pub max_checkpoints_per_year: u64,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("navigator.db"),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::Wal,
            sync_mode: SqliteSyncMode::Full,
            max_checkpoints_per_year: 3,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Analytical store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("store db error: {0}")]
    Db(String),
    /// Stored data failed an integrity check on load.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// The connection mutex was poisoned by a panicking holder.
    #[error("store mutex poisoned")]
    Poisoned,
    /// A write could not proceed after exhausting busy retries.
    #[error("store busy after {attempts} attempts")]
    Busy {
        /// Number of attempts made before giving up.
        attempts: u32,
    },
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed single-writer analytical store.
pub struct AnalyticalStore {
    connection: Mutex<Connection>,
}

impl AnalyticalStore {
    /// Opens (or creates) the analytical store at `config.path` and applies
    /// its schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or the
    /// schema cannot be initialized.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, StoreError> {
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self { connection: Mutex::new(connection) })
    }

    /// Runs `op` against the guarded connection, retrying on `SQLITE_BUSY`
    /// with a short backoff instead of failing the caller's year outright.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Busy`] once retries are exhausted, or
    /// propagates any other `rusqlite` error as [`StoreError::Db`].
    pub fn execute_with_retry<T>(
        &self,
        mut op: impl FnMut(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let guard = self.connection.lock().map_err(|_| StoreError::Poisoned)?;
        let mut attempts = 0;
        loop {
            match op(&guard) {
                Ok(value) => return Ok(value),
                Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::DatabaseBusy => {
                    attempts += 1;
                    if attempts >= MAX_BUSY_RETRIES {
                        return Err(StoreError::Busy { attempts });
                    }
                    thread::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempts)));
                }
                Err(err) => return Err(StoreError::Db(err.to_string())),
            }
        }
    }

    /// Returns `true` if `table` exists in the database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure.
    pub fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        self.execute_with_retry(|conn| {
            conn.query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
        })
    }

    /// Counts rows in `table`, optionally restricted to `simulation_year`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if `table` is not a known tracked table or on
    /// a database access failure.
    pub fn count(&self, table: &str, year: Option<SimulationYear>) -> Result<u64, StoreError> {
        let quoted = quote_tracked_table(table)?;
        self.execute_with_retry(|conn| {
            let count: i64 = match year {
                Some(year) => conn.query_row(
                    &format!("SELECT COUNT(*) FROM {quoted} WHERE simulation_year = ?1"),
                    params![year.value()],
                    |row| row.get(0),
                )?,
                None => {
                    conn.query_row(&format!("SELECT COUNT(*) FROM {quoted}"), params![], |row| row.get(0))?
                }
            };
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    /// Counts events of `event_type` in `fct_yearly_events` for `year` by
    /// matching the payload's `"event_type":"..."` tag, used by the
    /// scheduler's self-healing checks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure.
    pub fn count_events_by_type(&self, year: SimulationYear, event_type: &str) -> Result<u64, StoreError> {
        let needle = format!("%\"event_type\":\"{event_type}\"%");
        self.execute_with_retry(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM fct_yearly_events WHERE simulation_year = ?1 AND payload LIKE ?2",
                params![year.value(), needle],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    /// Counts hire events for `year` whose payload carries a null
    /// `compensation` field, used by EVENT_GENERATION's self-healing check
    /// for hires that compensation-assignment failed to backfill.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure.
    pub fn count_null_compensation_hires(&self, year: SimulationYear) -> Result<u64, StoreError> {
        let hire_needle = "%\"event_type\":\"hire\"%";
        let null_needle = "%\"compensation\":null%";
        self.execute_with_retry(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM fct_yearly_events WHERE simulation_year = ?1 AND payload LIKE ?2 AND payload LIKE ?3",
                params![year.value(), hire_needle, null_needle],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    /// Loads every event's `(employee_id, effective_date, event_sequence)`
    /// triple for `year`, ordered by employee and insertion order, for
    /// [`navigator_core::EventSequenceRule`]. Rows whose payload is missing
    /// either field are skipped rather than failing the whole load.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure.
    pub fn load_sequence_points(&self, year: SimulationYear) -> Result<Vec<SequencePoint>, StoreError> {
        let rows: Vec<(String, String)> = self.execute_with_retry(|conn| {
            let mut statement = conn.prepare(
                "SELECT employee_id, payload FROM fct_yearly_events WHERE simulation_year = ?1 ORDER BY employee_id, rowid",
            )?;
            let mut rows = statement.query(params![year.value()])?;
            let mut collected = Vec::new();
            while let Some(row) = rows.next()? {
                collected.push((row.get::<_, String>(0)?, row.get::<_, String>(1)?));
            }
            Ok(collected)
        })?;

        let mut points = Vec::new();
        for (employee_id, payload) in rows {
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&payload) else { continue };
            let Some(effective_date) = value.get("effective_date").and_then(serde_json::Value::as_str) else { continue };
            let Some(event_sequence) = value.get("event_sequence").and_then(serde_json::Value::as_u64) else { continue };
            points.push(SequencePoint {
                employee_id: EmployeeId::new(employee_id),
                effective_date: effective_date.to_string(),
                event_sequence: u32::try_from(event_sequence).unwrap_or(u32::MAX),
            });
        }
        Ok(points)
    }

    /// Counts `event_type` events per simulation year over the
    /// `lookback_years` immediately before `before_year`, for
    /// [`navigator_core::EventSpikeRule`]'s historical baseline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure.
    pub fn historical_event_type_counts(&self, event_type: &str, before_year: SimulationYear, lookback_years: u32) -> Result<Vec<u64>, StoreError> {
        let mut counts = Vec::new();
        for offset in 1..=lookback_years {
            let year = SimulationYear::new(before_year.value() - i32::try_from(offset).unwrap_or(i32::MAX));
            counts.push(self.count_events_by_type(year, event_type)?);
        }
        Ok(counts)
    }

    /// Counts employees present in `fct_workforce_snapshot` for `year` that
    /// were absent from the prior year's snapshot, used by
    /// STATE_ACCUMULATION's self-healing check for hires that never made it
    /// into the rolled-up snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure.
    pub fn count_new_snapshot_employees(&self, year: SimulationYear) -> Result<u64, StoreError> {
        self.execute_with_retry(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM fct_workforce_snapshot curr
                 WHERE curr.simulation_year = ?1
                 AND NOT EXISTS (
                     SELECT 1 FROM fct_workforce_snapshot prev
                     WHERE prev.employee_id = curr.employee_id AND prev.simulation_year = ?1 - 1
                 )",
                params![year.value()],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    /// Deletes all rows for `simulation_year` from `table`, used by
    /// `clear_mode: year` setup and by the self-healing scheduler to wipe a
    /// partially completed year before retrying it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if `table` is not a known tracked table or on
    /// a database access failure.
    pub fn delete_year(&self, table: &str, year: SimulationYear) -> Result<u64, StoreError> {
        let quoted = quote_tracked_table(table)?;
        self.execute_with_retry(|conn| {
            let deleted =
                conn.execute(&format!("DELETE FROM {quoted} WHERE simulation_year = ?1"), params![year.value()])?;
            Ok(u64::try_from(deleted).unwrap_or(0))
        })
    }

    /// Upserts an enrollment registry entry, keyed by employee id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure.
    pub fn upsert_enrollment_registry(&self, entry: &EnrollmentRegistryEntry) -> Result<(), StoreError> {
        self.execute_with_retry(|conn| {
            conn.execute(
                "INSERT INTO enrollment_registry
                    (employee_id, first_enrollment_date, ever_opted_out, current_deferral_rate)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(employee_id) DO UPDATE SET
                    first_enrollment_date = excluded.first_enrollment_date,
                    ever_opted_out = excluded.ever_opted_out,
                    current_deferral_rate = excluded.current_deferral_rate",
                params![
                    entry.employee_id.as_str(),
                    entry.first_enrollment_date,
                    entry.ever_opted_out,
                    entry.current_deferral_rate,
                ],
            )?;
            Ok(())
        })
    }

    /// Loads an enrollment registry entry by employee id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure.
    pub fn load_enrollment_registry(
        &self,
        employee_id: &EmployeeId,
    ) -> Result<Option<EnrollmentRegistryEntry>, StoreError> {
        self.execute_with_retry(|conn| {
            conn.query_row(
                "SELECT first_enrollment_date, ever_opted_out, current_deferral_rate
                 FROM enrollment_registry WHERE employee_id = ?1",
                params![employee_id.as_str()],
                |row| {
                    Ok(EnrollmentRegistryEntry {
                        employee_id: employee_id.clone(),
                        first_enrollment_date: row.get(0)?,
                        ever_opted_out: row.get(1)?,
                        current_deferral_rate: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Upserts a deferral escalation registry entry, keyed by employee id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure.
    pub fn upsert_deferral_escalation_registry(
        &self,
        employee_id: &EmployeeId,
        entry: &DeferralEscalationRegistryEntry,
    ) -> Result<(), StoreError> {
        self.execute_with_retry(|conn| {
            conn.execute(
                "INSERT INTO deferral_escalation_registry
                    (employee_id, escalation_count, current_deferral_rate)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(employee_id) DO UPDATE SET
                    escalation_count = excluded.escalation_count,
                    current_deferral_rate = excluded.current_deferral_rate",
                params![employee_id.as_str(), entry.escalation_count, entry.current_deferral_rate],
            )?;
            Ok(())
        })
    }

    /// Loads a deferral escalation registry entry by employee id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure.
    pub fn load_deferral_escalation_registry(
        &self,
        employee_id: &EmployeeId,
    ) -> Result<Option<DeferralEscalationRegistryEntry>, StoreError> {
        self.execute_with_retry(|conn| {
            conn.query_row(
                "SELECT escalation_count, current_deferral_rate
                 FROM deferral_escalation_registry WHERE employee_id = ?1",
                params![employee_id.as_str()],
                |row| Ok(DeferralEscalationRegistryEntry { escalation_count: row.get(0)?, current_deferral_rate: row.get(1)? }),
            )
            .optional()
        })
    }

    /// Persists a checkpoint as gzip-compressed canonical JSON, keyed by
    /// `(year, run_id, timestamp)` so multiple checkpoints per year can
    /// coexist until pruned. The stage sidecar written alongside it by
    /// [`Self::record_stage_checkpoint`] serves as the uncompressed legacy
    /// pointer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the checkpoint cannot be serialized or on
    /// a database access failure.
    pub fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let json = serde_json::to_vec(checkpoint).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let payload = gzip_compress(&json).map_err(|err| StoreError::Io(err.to_string()))?;
        self.execute_with_retry(|conn| {
            conn.execute(
                "INSERT INTO checkpoints (simulation_year, run_id, timestamp, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![checkpoint.year.value(), checkpoint.run_id.as_str(), checkpoint.timestamp, payload],
            )?;
            Ok(())
        })
    }

    /// Loads the most recent checkpoint for `year`, verifying its integrity
    /// hash before returning it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the most recent checkpoint fails
    /// decompression, deserialization, or its integrity check, or
    /// [`StoreError`] on a database access failure.
    pub fn latest_checkpoint(&self, year: SimulationYear) -> Result<Option<Checkpoint>, StoreError> {
        let payload: Option<Vec<u8>> = self.execute_with_retry(|conn| {
            conn.query_row(
                "SELECT payload FROM checkpoints WHERE simulation_year = ?1
                 ORDER BY timestamp DESC LIMIT 1",
                params![year.value()],
                |row| row.get(0),
            )
            .optional()
        })?;
        let Some(payload) = payload else {
            return Ok(None);
        };
        let json = gzip_decompress(&payload).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let checkpoint: Checkpoint =
            serde_json::from_slice(&json).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        if !checkpoint.integrity_holds() {
            return Err(StoreError::Corrupt(format!("checkpoint integrity hash mismatch for year {year}")));
        }
        Ok(Some(checkpoint))
    }

    /// Prunes all but the `max_checkpoints_per_year` most recent checkpoints
    /// for `year`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure.
    pub fn keep_latest_checkpoints(&self, year: SimulationYear, keep: u64) -> Result<u64, StoreError> {
        let keep = i64::try_from(keep).unwrap_or(i64::MAX);
        self.execute_with_retry(|conn| {
            let deleted = conn.execute(
                "DELETE FROM checkpoints WHERE simulation_year = ?1 AND rowid NOT IN (
                    SELECT rowid FROM checkpoints WHERE simulation_year = ?1
                    ORDER BY timestamp DESC LIMIT ?2
                 )",
                params![year.value(), keep],
            )?;
            Ok(u64::try_from(deleted).unwrap_or(0))
        })
    }

    /// Writes the lightweight stage sidecar from spec §4.9: the final
    /// stage a year reached, plus a state hash over that stage's row
    /// counts, distinct from the integrity checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure.
    pub fn record_stage_checkpoint(&self, year: SimulationYear, stage: &str) -> Result<(), StoreError> {
        let state_hash = HashDigest::new(format!("{}|{stage}", year.value()).as_bytes());
        let timestamp = unix_millis();
        self.execute_with_retry(|conn| {
            conn.execute(
                "INSERT INTO stage_checkpoints (simulation_year, stage, timestamp, state_hash)
                 VALUES (?1, ?2, ?3, ?4)",
                params![year.value(), stage, timestamp, state_hash.as_str()],
            )?;
            Ok(())
        })
    }

    /// Loads the most recently written stage checkpoint for `year`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure.
    pub fn latest_stage_checkpoint(&self, year: SimulationYear) -> Result<Option<StageCheckpoint>, StoreError> {
        self.execute_with_retry(|conn| {
            conn.query_row(
                "SELECT stage, timestamp, state_hash FROM stage_checkpoints
                 WHERE simulation_year = ?1 ORDER BY timestamp DESC LIMIT 1",
                params![year.value()],
                |row| {
                    let stage: String = row.get(0)?;
                    let timestamp: i64 = row.get(1)?;
                    let state_hash: String = row.get(2)?;
                    Ok(StageCheckpoint { year, stage, timestamp, state_hash: HashDigest::from_hex(state_hash) })
                },
            )
            .optional()
        })
    }

    /// Builds a recovery plan by walking backward from `requested_year`
    /// looking for the newest checkpoint whose `config_hash` matches
    /// `current_config_hash`, per spec §4.8: a config change invalidates
    /// every checkpoint written under the old configuration. A checkpoint
    /// that fails its integrity check is skipped in favor of the next
    /// earlier year rather than aborting the whole walk.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a database access failure other than
    /// checkpoint corruption.
    pub fn prepare_recovery_plan(
        &self,
        requested_year: SimulationYear,
        current_config_hash: &str,
    ) -> Result<RecoveryPlan, StoreError> {
        // No simulation spans more than a few centuries; this bounds the
        // backward walk without relying on year arithmetic near i32 limits.
        const MAX_YEARS_BACK: i32 = 500;
        for offset in 0..MAX_YEARS_BACK {
            let year = SimulationYear::new(requested_year.value() - offset);
            match self.latest_checkpoint(year) {
                Ok(Some(checkpoint)) if checkpoint.config_hash == current_config_hash => {
                    return Ok(RecoveryPlan {
                        resume_from_year: Some(checkpoint.year),
                        checkpoint: Some(checkpoint),
                        reason: RecoveryReason::CheckpointMatched,
                    });
                }
                Ok(Some(checkpoint)) => {
                    return Ok(RecoveryPlan {
                        resume_from_year: None,
                        checkpoint: Some(checkpoint),
                        reason: RecoveryReason::ConfigDrift,
                    });
                }
                Ok(None) | Err(StoreError::Corrupt(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(RecoveryPlan { resume_from_year: None, checkpoint: None, reason: RecoveryReason::NoCheckpoint })
    }
}

/// The reason a recovery plan resolved the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryReason {
    /// A checkpoint under the current configuration was found.
    CheckpointMatched,
    /// The newest checkpoint found was written under a different
    /// configuration and cannot be trusted for resume.
    ConfigDrift,
    /// No checkpoint exists for any prior year.
    NoCheckpoint,
}

/// The result of walking checkpoints backward to find a safe resume point.
#[derive(Debug, Clone)]
pub struct RecoveryPlan {
    /// The year to resume from, if any checkpoint was usable.
    pub resume_from_year: Option<SimulationYear>,
    /// The checkpoint the plan is based on, for diagnostics.
    pub checkpoint: Option<Checkpoint>,
    /// Why the plan resolved the way it did.
    pub reason: RecoveryReason,
}

impl RecoveryPlan {
    /// Returns `true` if a safe resume point was found.
    #[must_use]
    pub const fn can_resume(&self) -> bool {
        matches!(self.reason, RecoveryReason::CheckpointMatched)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Table names the store will run ad hoc DDL-adjacent operations
/// (`count`/`delete_year`) against. Anything else is rejected before it
/// reaches string interpolation.
const TRACKED_TABLES: &[&str] =
    &["fct_workforce_snapshot", "fct_yearly_events", "enrollment_registry", "deferral_escalation_registry"];

/// Validates `table` against [`TRACKED_TABLES`] and returns it unchanged.
fn quote_tracked_table(table: &str) -> Result<&str, StoreError> {
    TRACKED_TABLES
        .iter()
        .find(|&&known| known == table)
        .copied()
        .ok_or_else(|| StoreError::Io(format!("table '{table}' is not a tracked analytical table")))
}

/// Gzip-compresses `bytes` at the default compression level.
fn gzip_compress(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Decompresses a gzip stream produced by [`gzip_compress`].
fn gzip_decompress(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Ensures the parent directory for the store file exists.
fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| StoreError::Io(err.to_string()))
}

/// Opens an `SQLite` connection and applies the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, StoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(|err| StoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!(
            "PRAGMA journal_mode = {};
             PRAGMA synchronous = {};
             PRAGMA foreign_keys = ON;",
            config.journal_mode.pragma_value(),
            config.sync_mode.pragma_value(),
        ))
        .map_err(|err| StoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| StoreError::Db(err.to_string()))?;
    Ok(connection)
}

/// Creates the schema if absent; rejects a mismatched existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), StoreError> {
    let tx = connection.transaction().map_err(|err| StoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| StoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| StoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| StoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS fct_workforce_snapshot (
                    employee_id TEXT NOT NULL,
                    simulation_year INTEGER NOT NULL,
                    payload TEXT NOT NULL,
                    PRIMARY KEY (employee_id, simulation_year)
                 );
                 CREATE TABLE IF NOT EXISTS fct_yearly_events (
                    event_id TEXT NOT NULL PRIMARY KEY,
                    employee_id TEXT NOT NULL,
                    simulation_year INTEGER NOT NULL,
                    payload TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_events_year ON fct_yearly_events (simulation_year);
                 CREATE TABLE IF NOT EXISTS enrollment_registry (
                    employee_id TEXT NOT NULL PRIMARY KEY,
                    first_enrollment_date TEXT,
                    ever_opted_out INTEGER NOT NULL,
                    current_deferral_rate REAL NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS deferral_escalation_registry (
                    employee_id TEXT NOT NULL PRIMARY KEY,
                    escalation_count INTEGER NOT NULL,
                    current_deferral_rate REAL NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS checkpoints (
                    simulation_year INTEGER NOT NULL,
                    run_id TEXT NOT NULL,
                    timestamp INTEGER NOT NULL,
                    payload BLOB NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_checkpoints_year ON checkpoints (simulation_year, timestamp);
                 CREATE TABLE IF NOT EXISTS stage_checkpoints (
                    simulation_year INTEGER NOT NULL,
                    stage TEXT NOT NULL,
                    timestamp INTEGER NOT NULL,
                    state_hash TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_stage_checkpoints_year ON stage_checkpoints (simulation_year, timestamp);",
            )
            .map_err(|err| StoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(StoreError::Corrupt(format!("unsupported schema version: {value}")));
        }
    }
    tx.commit().map_err(|err| StoreError::Db(err.to_string()))?;
    Ok(())
}

/// Returns the current unix epoch in milliseconds.
#[must_use]
pub fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use navigator_core::DatabaseState;
    use navigator_core::RunId;
    use navigator_core::ValidationData;

    use super::*;

    fn temp_store() -> (tempfile::TempDir, AnalyticalStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = SqliteStoreConfig { path: dir.path().join("navigator.db"), ..SqliteStoreConfig::default() };
        let store = AnalyticalStore::open(&config).expect("open store");
        (dir, store)
    }

    #[test]
    fn tracked_tables_start_empty_and_reject_unknown_names() {
        let (_dir, store) = temp_store();
        assert_eq!(store.count("fct_workforce_snapshot", None).expect("count"), 0);
        assert!(store.count("sqlite_master", None).is_err());
    }

    #[test]
    fn enrollment_registry_round_trips() {
        let (_dir, store) = temp_store();
        let employee_id = EmployeeId::new("EMP-1");
        let mut entry = EnrollmentRegistryEntry::new(employee_id.clone());
        entry.apply_enrollment("2025-04-01", 0.03);
        store.upsert_enrollment_registry(&entry).expect("upsert");
        let loaded = store.load_enrollment_registry(&employee_id).expect("load").expect("present");
        assert_eq!(loaded, entry);
    }

    #[test]
    fn checkpoint_round_trips_and_detects_corruption() {
        let (_dir, store) = temp_store();
        let checkpoint = Checkpoint::new(
            SimulationYear::new(2025),
            RunId::new("run-1"),
            "hash-abc".to_string(),
            DatabaseState::default(),
            ValidationData::default(),
            unix_millis(),
        )
        .expect("checkpoint builds");
        store.save_checkpoint(&checkpoint).expect("save");
        let loaded = store.latest_checkpoint(SimulationYear::new(2025)).expect("load").expect("present");
        assert_eq!(loaded, checkpoint);
    }

    #[test]
    fn recovery_plan_walks_back_to_a_matching_checkpoint() {
        let (_dir, store) = temp_store();
        let checkpoint_2024 = Checkpoint::new(
            SimulationYear::new(2024),
            RunId::new("run-1"),
            "hash-current".to_string(),
            DatabaseState::default(),
            ValidationData::default(),
            unix_millis(),
        )
        .expect("checkpoint builds");
        store.save_checkpoint(&checkpoint_2024).expect("save");

        let plan = store.prepare_recovery_plan(SimulationYear::new(2026), "hash-current").expect("plan");
        assert!(plan.can_resume());
        assert_eq!(plan.resume_from_year, Some(SimulationYear::new(2024)));
    }

    #[test]
    fn recovery_plan_refuses_a_config_drifted_checkpoint() {
        let (_dir, store) = temp_store();
        let checkpoint = Checkpoint::new(
            SimulationYear::new(2025),
            RunId::new("run-1"),
            "hash-old".to_string(),
            DatabaseState::default(),
            ValidationData::default(),
            unix_millis(),
        )
        .expect("checkpoint builds");
        store.save_checkpoint(&checkpoint).expect("save");

        let plan = store.prepare_recovery_plan(SimulationYear::new(2025), "hash-new").expect("plan");
        assert!(!plan.can_resume());
        assert_eq!(plan.reason, RecoveryReason::ConfigDrift);
    }

    #[test]
    fn recovery_plan_skips_a_corrupt_checkpoint_and_falls_back_to_the_prior_year() {
        let (_dir, store) = temp_store();
        let checkpoint_2025 = Checkpoint::new(
            SimulationYear::new(2025),
            RunId::new("run-1"),
            "hash-current".to_string(),
            DatabaseState::default(),
            ValidationData::default(),
            unix_millis(),
        )
        .expect("checkpoint builds");
        store.save_checkpoint(&checkpoint_2025).expect("save");

        let checkpoint_2026 = Checkpoint::new(
            SimulationYear::new(2026),
            RunId::new("run-1"),
            "hash-current".to_string(),
            DatabaseState::default(),
            ValidationData::default(),
            unix_millis(),
        )
        .expect("checkpoint builds");
        store.save_checkpoint(&checkpoint_2026).expect("save");
        store
            .execute_with_retry(|conn| {
                conn.execute(
                    "UPDATE checkpoints SET payload = ?1 WHERE simulation_year = ?2",
                    params![b"not valid json".as_slice(), 2026],
                )
            })
            .expect("corrupt the 2026 checkpoint");

        assert!(matches!(store.latest_checkpoint(SimulationYear::new(2026)), Err(StoreError::Corrupt(_))));

        let plan = store.prepare_recovery_plan(SimulationYear::new(2026), "hash-current").expect("plan");
        assert!(plan.can_resume());
        assert_eq!(plan.resume_from_year, Some(SimulationYear::new(2025)));
    }

    fn insert_event(store: &AnalyticalStore, event_id: &str, year: i32, payload: &str) {
        store
            .execute_with_retry(|conn| {
                conn.execute(
                    "INSERT INTO fct_yearly_events (event_id, employee_id, simulation_year, payload) VALUES (?1, 'EMP-1', ?2, ?3)",
                    params![event_id, year, payload],
                )
            })
            .expect("insert event");
    }

    fn insert_snapshot_row(store: &AnalyticalStore, employee_id: &str, year: i32) {
        store
            .execute_with_retry(|conn| {
                conn.execute(
                    "INSERT INTO fct_workforce_snapshot (employee_id, simulation_year, payload) VALUES (?1, ?2, '{}')",
                    params![employee_id, year],
                )
            })
            .expect("insert snapshot row");
    }

    #[test]
    fn count_null_compensation_hires_matches_only_hire_events_missing_compensation() {
        let (_dir, store) = temp_store();
        insert_event(&store, "evt-1", 2025, r#"{"event_type":"hire","compensation":null}"#);
        insert_event(&store, "evt-2", 2025, r#"{"event_type":"hire","compensation":75000}"#);
        insert_event(&store, "evt-3", 2025, r#"{"event_type":"termination","compensation":null}"#);

        let count = store.count_null_compensation_hires(SimulationYear::new(2025)).expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn count_new_snapshot_employees_excludes_those_carried_over_from_the_prior_year() {
        let (_dir, store) = temp_store();
        insert_snapshot_row(&store, "EMP-1", 2024);
        insert_snapshot_row(&store, "EMP-1", 2025);
        insert_snapshot_row(&store, "EMP-2", 2025);

        let new_hires = store.count_new_snapshot_employees(SimulationYear::new(2025)).expect("count");
        assert_eq!(new_hires, 1);
    }

    #[test]
    fn load_sequence_points_skips_payloads_missing_either_field() {
        let (_dir, store) = temp_store();
        insert_event(&store, "evt-1", 2025, r#"{"effective_date":"2025-03-01","event_sequence":1}"#);
        insert_event(&store, "evt-2", 2025, r#"{"effective_date":"2025-06-01"}"#);

        let points = store.load_sequence_points(SimulationYear::new(2025)).expect("points");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].effective_date, "2025-03-01");
        assert_eq!(points[0].event_sequence, 1);
    }

    #[test]
    fn historical_event_type_counts_covers_the_requested_lookback_window() {
        let (_dir, store) = temp_store();
        insert_event(&store, "evt-2023", 2023, r#"{"event_type":"hire"}"#);
        insert_event(&store, "evt-2024-a", 2024, r#"{"event_type":"hire"}"#);
        insert_event(&store, "evt-2024-b", 2024, r#"{"event_type":"hire"}"#);

        let counts = store.historical_event_type_counts("hire", SimulationYear::new(2025), 3).expect("counts");
        assert_eq!(counts, vec![2, 1, 0]);
    }
}
