#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )
)]
#![allow(clippy::print_stdout, clippy::print_stderr, reason = "This binary's entire job is rendering run output to the operator's terminal.")]
// navigator-cli/src/main.rs
// ============================================================================
// Module: Navigator CLI Entry Point
// Description: Parses arguments, runs one multi-year simulation, and
//              renders the result.
// Purpose: Give operators a single command to drive a simulation run.
// Dependencies: navigator-cli (this crate's library target), clap
// ============================================================================

use std::process::ExitCode;

use clap::Parser;
use navigator_cli::Args;
use navigator_cli::CliError;
use navigator_cli::run;

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(outcome) => {
            if args.verbose {
                for entry in &outcome.year_reports {
                    println!("{entry}");
                }
            }
            println!("{}", render_summary(&outcome.summary));
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("navigator: {}", render_error(&err));
            ExitCode::FAILURE
        }
    }
}

fn render_summary(summary: &navigator_scheduler::MultiYearSummary) -> String {
    serde_json::json!({
        "completed_years": summary.completed_years.iter().map(|year| year.value()).collect::<Vec<_>>(),
        "resumed_from": summary.resumed_from.map(navigator_core::SimulationYear::value),
        "growth_analysis": summary.growth_analysis,
        "event_trends": summary.event_trends,
        "participation_trends": summary.participation_trends,
        "threading_metadata": summary.threading_metadata,
    })
    .to_string()
}

fn render_error(err: &CliError) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_error_produces_a_single_line_message() {
        let err = CliError::Io("disk full".to_string());
        let rendered = render_error(&err);
        assert!(!rendered.contains('\n'));
        assert!(rendered.contains("disk full"));
    }
}
