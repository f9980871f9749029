//! Readiness polling
//!
//! A freshly started engine refuses connections for a while. The poller
//! probes the management API on a fixed interval until it answers with a
//! success status or the attempt budget runs out.

use std::time::Duration;

use async_trait::async_trait;

use super::client::EngineClient;
use crate::common::config::ReadinessConfig;
use crate::common::{Error, Result};

/// Something that can tell whether the engine accepts management requests
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// `Ok` means ready. `RemoteUnavailable`, `Timeout` and `RemoteError` mean not yet.
    async fn probe(&self) -> Result<()>;
}

/// Probe backed by `GET /flow/status`
pub struct StatusProbe<'a> {
    client: &'a EngineClient,
    url: String,
    timeout: Duration,
}

impl<'a> StatusProbe<'a> {
    pub fn new(client: &'a EngineClient, url: String, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }
}

#[async_trait]
impl<'a> ReadinessProbe for StatusProbe<'a> {
    async fn probe(&self) -> Result<()> {
        self.client.probe(&self.url, self.timeout).await
    }
}

/// Outcome of a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The probe succeeded on this attempt
    Ready { attempts: u32 },
    /// Every attempt failed softly
    Exhausted { attempts: u32 },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

/// Poll `probe` until it succeeds or `policy.max_attempts` probes have failed
///
/// Sleeps `policy.interval()` between attempts, never after the last one.
/// Errors other than "unreachable", a timed-out probe or a non-success status
/// abort polling.
pub async fn wait_until_ready<P>(probe: &P, policy: &ReadinessConfig) -> Result<Readiness>
where
    P: ReadinessProbe + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match probe.probe().await {
            Ok(()) => {
                tracing::info!(attempt, "engine is ready");
                return Ok(Readiness::Ready { attempts: attempt });
            }
            Err(e) if e.is_unavailable() => {
                tracing::info!(attempt, max_attempts, "connection failed: {}", e);
            }
            Err(e) if e.is_timeout() => {
                tracing::info!(attempt, max_attempts, "probe timed out: {}", e);
            }
            Err(Error::RemoteError { status, .. }) => {
                tracing::info!(attempt, max_attempts, status, "engine not ready yet");
            }
            Err(e) => return Err(e),
        }

        if attempt < max_attempts {
            tokio::time::sleep(policy.interval()).await;
        }
    }

    tracing::warn!(max_attempts, "readiness attempts exhausted");
    Ok(Readiness::Exhausted {
        attempts: max_attempts,
    })
}
