//! Run phases and the final report of a smoke test

use std::fmt;
use std::time::Duration;

use colored::Colorize;

use crate::common::Error;
use crate::engine::{CounterKey, CounterValue, RunOutcome};

/// Exit code when the counter increased
pub const EXIT_PASS: i32 = 0;
/// Exit code when the counter did not increase
pub const EXIT_FAIL: i32 = 1;
/// Exit code when the run was aborted before a verdict
pub const EXIT_ABORTED: i32 = 2;
/// Exit code when the run passed but the container could not be stopped
pub const EXIT_TEARDOWN_FAILED: i32 = 3;

/// States of the orchestrator, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Provisioning,
    AwaitingReady,
    Deploying,
    Starting,
    Stimulating,
    Verifying,
    TearingDown,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Provisioning => "provisioning",
            Phase::AwaitingReady => "awaiting ready",
            Phase::Deploying => "deploying",
            Phase::Starting => "starting",
            Phase::Stimulating => "stimulating",
            Phase::Verifying => "verifying",
            Phase::TearingDown => "tearing down",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counter readings around the stimulus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub counter: CounterKey,
    pub before: CounterValue,
    pub after: CounterValue,
    pub outcome: RunOutcome,
}

/// How far a run got
#[derive(Debug)]
pub enum RunStatus {
    /// Every phase ran; the verification holds the verdict
    Completed(Verification),
    /// An error stopped the run in `phase`
    Aborted { phase: Phase, error: Error },
}

/// Everything a caller needs after a run
#[derive(Debug)]
pub struct RunReport {
    pub status: RunStatus,
    /// `Some` when stopping the container failed
    pub teardown_error: Option<Error>,
    /// Phases entered, starting at [`Phase::Idle`]
    pub phases: Vec<Phase>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn outcome(&self) -> Option<RunOutcome> {
        match &self.status {
            RunStatus::Completed(verification) => Some(verification.outcome),
            RunStatus::Aborted { .. } => None,
        }
    }

    pub fn final_phase(&self) -> Phase {
        self.phases.last().copied().unwrap_or(Phase::Idle)
    }

    /// Process exit code. A teardown failure never hides a failed or aborted run.
    pub fn exit_code(&self) -> i32 {
        match (self.outcome(), &self.teardown_error) {
            (None, _) => EXIT_ABORTED,
            (Some(RunOutcome::Fail), _) => EXIT_FAIL,
            (Some(RunOutcome::Pass), Some(_)) => EXIT_TEARDOWN_FAILED,
            (Some(RunOutcome::Pass), None) => EXIT_PASS,
        }
    }
}

/// Print the verdict lines
pub fn print_summary(report: &RunReport) {
    match &report.status {
        RunStatus::Completed(v) => match v.outcome {
            RunOutcome::Pass => println!(
                "\n{} {} ({} -> {})",
                "✓".green().bold(),
                "Counter incremented successfully".green().bold(),
                v.before,
                v.after
            ),
            RunOutcome::Fail => println!(
                "\n{} {} ({} -> {})",
                "✗".red().bold(),
                "Counter did not increase".red().bold(),
                v.before,
                v.after
            ),
        },
        RunStatus::Aborted { phase, error } => println!(
            "\n{} {} {}: {}",
            "✗".red().bold(),
            "Run aborted while".red().bold(),
            phase.to_string().red().bold(),
            error
        ),
    }

    if let Some(error) = &report.teardown_error {
        println!("{} {}", "!".yellow().bold(), error.to_string().yellow());
    }

    println!(
        "  {}",
        format!("{:.1} seconds elapsed since start", report.elapsed.as_secs_f64()).dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: Option<RunOutcome>, teardown_failed: bool) -> RunReport {
        let status = match outcome {
            Some(outcome) => RunStatus::Completed(Verification {
                counter: CounterKey::new("testCounterSuccess", "All UpdateCounter's"),
                before: CounterValue::ZERO,
                after: CounterValue::new(1),
                outcome,
            }),
            None => RunStatus::Aborted {
                phase: Phase::Stimulating,
                error: Error::remote_error("POST", "http://localhost:8081/testInput", 500, ""),
            },
        };
        RunReport {
            status,
            teardown_error: teardown_failed.then(|| Error::teardown("abc", "daemon gone")),
            phases: vec![Phase::Idle, Phase::Provisioning, Phase::TearingDown, Phase::Done],
            elapsed: Duration::from_secs(3),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(report(Some(RunOutcome::Pass), false).exit_code(), EXIT_PASS);
        assert_eq!(report(Some(RunOutcome::Fail), false).exit_code(), EXIT_FAIL);
        assert_eq!(report(None, false).exit_code(), EXIT_ABORTED);
        assert_eq!(
            report(Some(RunOutcome::Pass), true).exit_code(),
            EXIT_TEARDOWN_FAILED
        );
    }

    #[test]
    fn test_teardown_failure_does_not_mask_outcome() {
        assert_eq!(report(Some(RunOutcome::Fail), true).exit_code(), EXIT_FAIL);
        assert_eq!(report(None, true).exit_code(), EXIT_ABORTED);
        assert_eq!(report(Some(RunOutcome::Fail), true).outcome(), Some(RunOutcome::Fail));
    }

    #[test]
    fn test_final_phase() {
        assert_eq!(report(None, false).final_phase(), Phase::Done);
        assert_eq!(Phase::AwaitingReady.to_string(), "awaiting ready");
    }
}
