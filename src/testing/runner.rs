//! Smoke test orchestration
//!
//! Sequences one run: provision the engine container, wait for it, deploy
//! the flow, start it, post a stimulus and check that the counter moved.
//! The container is torn down exactly once no matter how the run ends,
//! including errors, panics inside a phase, and interruption.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use colored::Colorize;
use futures_util::FutureExt;

use super::report::{Phase, RunReport, RunStatus, Verification};
use crate::common::config::OnExhausted;
use crate::common::{Config, Error, Result};
use crate::container::{ProvisionedInstance, Provisioner};
use crate::engine::{
    evaluate, wait_until_ready, wrap, CounterKey, CounterVerifier, EngineClient, Endpoints,
    FlowDefinition, FlowDeployer, Readiness, StatusProbe,
};

/// Ordered record of the phases a run has entered
#[derive(Debug)]
struct PhaseLog {
    phases: Vec<Phase>,
}

impl PhaseLog {
    fn new() -> Self {
        Self {
            phases: vec![Phase::Idle],
        }
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(%phase, "entering phase");
        self.phases.push(phase);
    }

    fn current(&self) -> Phase {
        self.phases.last().copied().unwrap_or(Phase::Idle)
    }
}

/// One smoke test run against a freshly provisioned engine
pub struct SmokeTest<'a, P: Provisioner + ?Sized> {
    config: &'a Config,
    provisioner: &'a P,
    client: EngineClient,
    endpoints: Endpoints,
    started: Instant,
}

impl<'a, P: Provisioner + ?Sized> SmokeTest<'a, P> {
    pub fn new(config: &'a Config, provisioner: &'a P) -> Result<Self> {
        Ok(Self {
            config,
            provisioner,
            client: EngineClient::new(std::time::Duration::from_secs(
                config.engine.request_timeout_secs,
            ))?,
            endpoints: Endpoints::from_config(&config.engine),
            started: Instant::now(),
        })
    }

    /// Measure elapsed time from `started` instead of construction
    pub fn started_at(mut self, started: Instant) -> Self {
        self.started = started;
        self
    }

    /// Run every phase, racing them against `interrupt`
    ///
    /// Never returns an error: failures are reported in [`RunReport::status`].
    pub async fn run<F>(&self, flow: &FlowDefinition, interrupt: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        let mut log = PhaseLog::new();
        let mut interrupt = std::pin::pin!(interrupt);

        log.enter(Phase::Provisioning);
        println!("\n{} {}", "Provisioning".cyan(), self.config.container.image.white().bold());
        let mut provision = std::pin::pin!(ProvisionedInstance::provision(
            self.provisioner,
            &self.config.container
        ));
        // An interrupt here must not abandon a container the runtime is creating
        let mut interrupted = false;
        let provisioned = tokio::select! {
            result = &mut provision => result,
            _ = &mut interrupt => {
                println!("  {} Interrupted, stopping once the container is up", "!".yellow());
                interrupted = true;
                (&mut provision).await
            }
        };
        let instance = match provisioned {
            Ok(instance) => instance,
            Err(error) => {
                println!("  {} {}", "✗".red(), error);
                log.enter(Phase::Failed);
                return self.report(
                    RunStatus::Aborted {
                        phase: Phase::Provisioning,
                        error,
                    },
                    None,
                    log,
                );
            }
        };
        println!("  {} Container {}", "✓".green(), instance.handle().short_id().dimmed());

        let result = if interrupted {
            Err(Error::Interrupted)
        } else {
            let exercise = AssertUnwindSafe(self.exercise(flow, &mut log)).catch_unwind();
            tokio::select! {
                result = exercise => result.unwrap_or_else(|panic| Err(Error::Internal(panic_message(panic)))),
                _ = &mut interrupt => Err(Error::Interrupted),
            }
        };
        let failed_in = log.current();

        log.enter(Phase::TearingDown);
        println!("\n{}", "Stopping container".cyan());
        let teardown_error = match instance.teardown().await {
            Ok(()) => {
                println!("  {} Container stopped", "✓".green());
                None
            }
            Err(e) => {
                tracing::error!("teardown failed: {}", e);
                Some(e)
            }
        };

        let status = match result {
            Ok(verification) => {
                log.enter(Phase::Done);
                RunStatus::Completed(verification)
            }
            Err(error) => {
                log.enter(Phase::Failed);
                RunStatus::Aborted {
                    phase: failed_in,
                    error,
                }
            }
        };
        self.report(status, teardown_error, log)
    }

    /// Everything between provisioning and teardown
    async fn exercise(&self, flow: &FlowDefinition, log: &mut PhaseLog) -> Result<Verification> {
        let verify = &self.config.verify;

        log.enter(Phase::AwaitingReady);
        println!("\n{}", "Waiting for engine".cyan());
        let probe = StatusProbe::new(
            &self.client,
            self.endpoints.status(),
            self.config.readiness.attempt_timeout(),
        );
        match wait_until_ready(&probe, &self.config.readiness).await? {
            Readiness::Ready { attempts } => {
                println!("  {} Ready after {} attempt(s)", "✓".green(), attempts);
            }
            Readiness::Exhausted { attempts } => match self.config.readiness.on_exhausted {
                OnExhausted::Fail => return Err(Error::ReadinessExhausted { attempts }),
                OnExhausted::Continue => {
                    println!(
                        "  {} Not ready after {} attempts, continuing anyway",
                        "!".yellow(),
                        attempts
                    );
                }
            },
        }
        self.report_elapsed();

        log.enter(Phase::Deploying);
        println!("\n{}", "Deploying flow".cyan());
        let deployer = FlowDeployer::new(&self.client, &self.endpoints, verify.start_settle());
        let root_id = deployer.get_root_id().await?;
        println!("  {} Root process group {}", "✓".green(), root_id.dimmed());
        deployer.deploy(&root_id, &wrap(flow)).await?;
        println!("  {} Flow uploaded", "✓".green());

        log.enter(Phase::Starting);
        deployer.start(&root_id).await?;
        println!("  {} Flow started", "✓".green());

        log.enter(Phase::Stimulating);
        println!("\n{}", "Sending test event".cyan());
        let verifier = CounterVerifier::new(&self.client, &self.endpoints);
        let counter = CounterKey::new(verify.counter_name.clone(), verify.counter_context.clone());
        let before = verifier.read_counter(&counter).await?;
        println!("  Initial value of {} is {}", counter.name.white().bold(), before);
        verifier.stimulate(&verify.stimulus).await?;
        println!("  {} Event posted", "✓".green());
        tokio::time::sleep(verify.stimulus_settle()).await;

        log.enter(Phase::Verifying);
        let after = verifier.read_counter(&counter).await?;
        println!("  New value of {} is {}", counter.name.white().bold(), after);

        Ok(Verification {
            outcome: evaluate(before, after),
            counter,
            before,
            after,
        })
    }

    fn report_elapsed(&self) {
        let elapsed = self.started.elapsed();
        tracing::info!(elapsed_secs = elapsed.as_secs_f64(), "elapsed since start");
        println!(
            "  {}",
            format!("{:.1} seconds elapsed since start", elapsed.as_secs_f64()).dimmed()
        );
    }

    fn report(&self, status: RunStatus, teardown_error: Option<Error>, log: PhaseLog) -> RunReport {
        RunReport {
            status,
            teardown_error,
            phases: log.phases,
            elapsed: self.started.elapsed(),
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("run panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("run panicked: {}", s)
    } else {
        "run panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_log_starts_idle() {
        let mut log = PhaseLog::new();
        assert_eq!(log.current(), Phase::Idle);
        log.enter(Phase::Provisioning);
        assert_eq!(log.current(), Phase::Provisioning);
        assert_eq!(log.phases, vec![Phase::Idle, Phase::Provisioning]);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "run panicked: boom");
        assert_eq!(
            panic_message(Box::new(String::from("bang"))),
            "run panicked: bang"
        );
        assert_eq!(panic_message(Box::new(7_u8)), "run panicked");
    }
}
