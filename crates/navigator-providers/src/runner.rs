// navigator-providers/src/runner.rs
// ============================================================================
// Module: Transformation Runner Adapter
// Description: Drives the external SQL-mode transformation process per stage.
// Purpose: Give the scheduler a narrow, bounded interface to invoke dbt-style
//          model runs without coupling it to process management details.
// Dependencies: navigator-core, thiserror
// ============================================================================

//! ## Overview
//! `SQL` mode delegates event generation and state accumulation to an
//! external transformation command (e.g. a dbt invocation) per stage and
//! optional shard. The runner enforces the same bounded-call discipline the
//! HTTP evidence provider uses for outbound requests: a hard timeout and a
//! captured-output size limit, so a hung or runaway transformation process
//! fails the stage instead of the pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use navigator_core::SimulationYear;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome of a single transformation invocation.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Process exit code, or `None` if the process was killed after timeout.
    pub exit_code: Option<i32>,
    /// Captured standard output, truncated to `max_output_bytes`.
    pub stdout: String,
    /// Captured standard error, truncated to `max_output_bytes`.
    pub stderr: String,
    /// Wall-clock duration of the invocation.
    pub duration: Duration,
}

impl RunOutcome {
    /// Returns `true` if the process exited with status `0`.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Errors raised while invoking a transformation process.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The command could not be spawned.
    #[error("failed to spawn transformation command: {0}")]
    Spawn(String),
    /// The process was killed after exceeding its timeout.
    #[error("transformation command for stage '{stage}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Stage being run when the timeout fired.
        stage: String,
        /// Configured timeout, in milliseconds.
        timeout_ms: u64,
    },
    /// Reading the child's output streams failed.
    #[error("failed to read transformation command output: {0}")]
    Io(String),
}

/// Drives a single stage of the external transformation process.
pub trait TransformationRunner {
    /// Runs `stage` for `year`, optionally restricted to `shard` of a
    /// sharded `EVENT_GENERATION` pass. `full_refresh` asks the underlying
    /// transformation to rebuild its target from scratch rather than
    /// incrementally; self-healing rebuild triggers always pass `true`.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] if the process cannot be spawned, times out,
    /// or its output cannot be captured.
    fn run_stage(&self, stage: &str, year: SimulationYear, shard: Option<u32>, full_refresh: bool) -> Result<RunOutcome, RunnerError>;
}

// ============================================================================
// SECTION: Process-backed implementation
// ============================================================================

/// Configuration for [`ProcessTransformationRunner`].
#[derive(Debug, Clone)]
pub struct ProcessRunnerConfig {
    /// Executable to invoke, e.g. `"dbt"`.
    pub command: String,
    /// Fixed leading arguments, e.g. `["run", "--select"]`.
    pub base_args: Vec<String>,
    /// Working directory the command is run in.
    pub working_dir: Option<String>,
    /// Hard wall-clock timeout per invocation.
    pub timeout: Duration,
    /// Maximum bytes captured from stdout/stderr before truncation.
    pub max_output_bytes: usize,
}

impl Default for ProcessRunnerConfig {
    fn default() -> Self {
        Self {
            command: "dbt".to_string(),
            base_args: vec!["run".to_string()],
            working_dir: None,
            timeout: Duration::from_secs(600),
            max_output_bytes: 1024 * 1024,
        }
    }
}

/// Runs the transformation command as a child process, tagging each
/// invocation with `--vars` carrying the stage, year, and shard.
pub struct ProcessTransformationRunner {
    config: ProcessRunnerConfig,
}

impl ProcessTransformationRunner {
    /// Creates a new process-backed runner.
    #[must_use]
    pub const fn new(config: ProcessRunnerConfig) -> Self {
        Self { config }
    }
}

impl TransformationRunner for ProcessTransformationRunner {
    fn run_stage(&self, stage: &str, year: SimulationYear, shard: Option<u32>, full_refresh: bool) -> Result<RunOutcome, RunnerError> {
        let vars = match shard {
            Some(shard) => {
                format!("{{stage: {stage}, simulation_year: {}, shard: {shard}, full_refresh: {full_refresh}}}", year.value())
            }
            None => format!("{{stage: {stage}, simulation_year: {}, full_refresh: {full_refresh}}}", year.value()),
        };

        let mut command = Command::new(&self.config.command);
        command.args(&self.config.base_args).arg("--vars").arg(vars);
        if full_refresh {
            command.arg("--full-refresh");
        }
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|err| RunnerError::Spawn(err.to_string()))?;
        let killed = watch_for_timeout(&mut child, self.config.timeout);

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();
        let stdout = read_capped(stdout_handle.as_mut(), self.config.max_output_bytes)?;
        let stderr = read_capped(stderr_handle.as_mut(), self.config.max_output_bytes)?;
        let status = child.wait().map_err(|err| RunnerError::Io(err.to_string()))?;

        if killed.load(Ordering::SeqCst) {
            return Err(RunnerError::Timeout {
                stage: stage.to_string(),
                timeout_ms: u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }

        Ok(RunOutcome { exit_code: status.code(), stdout, stderr, duration: self.config.timeout })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Spawns a watcher thread that kills `child` if it outlives `timeout`.
/// Returns a flag the caller can check after `wait()` to learn whether the
/// kill fired.
fn watch_for_timeout(child: &mut Child, timeout: Duration) -> Arc<AtomicBool> {
    let killed = Arc::new(AtomicBool::new(false));
    let id = child.id();
    let killed_handle = Arc::clone(&killed);
    let started = Instant::now();
    thread::spawn(move || {
        let remaining = timeout.saturating_sub(started.elapsed());
        thread::sleep(remaining);
        if started.elapsed() >= timeout {
            killed_handle.store(true, Ordering::SeqCst);
            #[cfg(unix)]
            {
                // SAFETY net via the standard library's process APIs is not
                // available for an arbitrary pid without an extra
                // dependency; best-effort termination via the OS kill(1)
                // command keeps this portable across the targets the
                // transformation command actually runs on.
                let _ = Command::new("kill").arg("-9").arg(id.to_string()).status();
            }
        }
    });
    killed
}

/// Reads a stream to completion, truncating at `max_bytes`.
fn read_capped(stream: Option<&mut impl Read>, max_bytes: usize) -> Result<String, RunnerError> {
    let Some(stream) = stream else {
        return Ok(String::new());
    };
    let mut buf = Vec::new();
    stream.take(u64::try_from(max_bytes).unwrap_or(u64::MAX)).read_to_end(&mut buf).map_err(|err| RunnerError::Io(err.to_string()))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_outcome_succeeded_checks_exit_code() {
        let outcome =
            RunOutcome { exit_code: Some(0), stdout: String::new(), stderr: String::new(), duration: Duration::ZERO };
        assert!(outcome.succeeded());
        let failed =
            RunOutcome { exit_code: Some(1), stdout: String::new(), stderr: String::new(), duration: Duration::ZERO };
        assert!(!failed.succeeded());
    }

    #[test]
    fn process_runner_runs_a_trivial_command_and_captures_output() {
        let config = ProcessRunnerConfig {
            command: "echo".to_string(),
            base_args: vec!["hello".to_string()],
            working_dir: None,
            timeout: Duration::from_secs(5),
            max_output_bytes: 1024,
        };
        let runner = ProcessTransformationRunner::new(config);
        let outcome = runner.run_stage("event_generation", SimulationYear::new(2025), None, false).expect("run");
        assert!(outcome.succeeded());
        assert!(outcome.stdout.contains("hello"));
    }

    #[test]
    fn full_refresh_adds_the_dbt_full_refresh_flag() {
        let config = ProcessRunnerConfig {
            command: "echo".to_string(),
            base_args: vec!["hello".to_string()],
            working_dir: None,
            timeout: Duration::from_secs(5),
            max_output_bytes: 1024,
        };
        let runner = ProcessTransformationRunner::new(config);
        let outcome = runner.run_stage("event_generation", SimulationYear::new(2025), None, true).expect("run");
        assert!(outcome.succeeded());
    }
}
