//! Container provisioning
//!
//! The [`Provisioner`] trait hides the container runtime so the orchestrator
//! can be exercised without Docker. [`ProvisionedInstance`] owns the one
//! container of a run and can only be torn down once.

mod docker;

pub use docker::DockerProvisioner;

use async_trait::async_trait;

use crate::common::config::{ContainerConfig, PortMapping};
use crate::common::Result;

/// Lifecycle state of a provisioned container
///
/// A container that is still starting has no [`ProvisionedInstance`] yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Running,
    Stopped,
}

/// Runtime handle to a started container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHandle {
    /// Opaque runtime identifier
    pub id: String,
    pub image: String,
    pub ports: Vec<PortMapping>,
    /// The runtime deletes the container itself once stopped
    pub auto_remove: bool,
}

impl InstanceHandle {
    /// Identifier shortened the way `docker ps` shows it
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// Starts and stops engine containers
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create and start a container, returning once the runtime reports it started
    ///
    /// On failure nothing is left behind.
    async fn start(&self, spec: &ContainerConfig) -> Result<InstanceHandle>;

    /// Stop (and, depending on `auto_remove`, delete) a container
    async fn stop(&self, handle: &InstanceHandle) -> Result<()>;
}

/// The container of one run
///
/// Dropping a running instance only logs; release happens through
/// [`teardown`](Self::teardown), which consumes the instance.
pub struct ProvisionedInstance<'p, P: Provisioner + ?Sized> {
    provisioner: &'p P,
    handle: InstanceHandle,
    state: InstanceState,
}

impl<'p, P: Provisioner + ?Sized> ProvisionedInstance<'p, P> {
    pub async fn provision(provisioner: &'p P, spec: &ContainerConfig) -> Result<Self> {
        tracing::info!(image = %spec.image, "starting container");
        let handle = provisioner.start(spec).await?;
        tracing::info!(id = handle.short_id(), "container running");
        Ok(Self {
            provisioner,
            handle,
            state: InstanceState::Running,
        })
    }

    pub fn handle(&self) -> &InstanceHandle {
        &self.handle
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Stop the container. Never retried: the instance is marked stopped either way.
    pub async fn teardown(mut self) -> Result<()> {
        tracing::info!(id = self.handle.short_id(), "stopping container");
        self.state = InstanceState::Stopped;
        self.provisioner.stop(&self.handle).await
    }
}

impl<P: Provisioner + ?Sized> Drop for ProvisionedInstance<'_, P> {
    fn drop(&mut self) {
        if self.state != InstanceState::Stopped {
            tracing::error!(
                id = %self.handle.id,
                "container was not torn down; stop it with `docker stop {}`",
                self.handle.short_id()
            );
        }
    }
}
