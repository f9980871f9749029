//! Docker-backed provisioner using `bollard`

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    Config as CreateConfig, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use futures_util::StreamExt;

use super::{InstanceHandle, Provisioner};
use crate::common::config::ContainerConfig;
use crate::common::{Error, Result};

/// Provisioner talking to the local Docker daemon
pub struct DockerProvisioner {
    docker: Docker,
    stop_timeout_secs: u64,
}

impl DockerProvisioner {
    /// Connect using the platform's default socket (honours `DOCKER_HOST`)
    pub fn connect_local() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::Provisioning(format!("failed to connect to docker: {}", e)))?;
        Ok(Self {
            docker,
            stop_timeout_secs: 10,
        })
    }

    /// Grace period before Docker kills the container on stop
    pub fn with_stop_timeout(mut self, secs: u64) -> Self {
        self.stop_timeout_secs = secs;
        self
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        match self.docker.inspect_image(image).await {
            Ok(_) => return Ok(()),
            Err(e) if status_code(&e) == Some(404) => {}
            Err(e) => {
                return Err(Error::Provisioning(format!(
                    "inspect image {} failed: {}",
                    image, e
                )))
            }
        }

        tracing::info!(image, "pulling image");
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut progress = std::pin::pin!(self.docker.create_image(Some(options), None, None));
        while let Some(update) = progress.next().await {
            let update = update
                .map_err(|e| Error::Provisioning(format!("pull {} failed: {}", image, e)))?;
            if let Some(status) = update.status {
                tracing::debug!(image, %status, "pull");
            }
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> std::result::Result<(), BollardError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
    }
}

/// Port key in Docker's `"<port>/tcp"` form
fn port_key(port: u16) -> String {
    format!("{}/tcp", port)
}

fn create_config(spec: &ContainerConfig) -> CreateConfig<String> {
    let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
        .ports
        .iter()
        .map(|p| (port_key(p.container), HashMap::new()))
        .collect();
    let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
        .ports
        .iter()
        .map(|p| {
            (
                port_key(p.container),
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(p.host.to_string()),
                }]),
            )
        })
        .collect();

    CreateConfig {
        image: Some(spec.image.clone()),
        exposed_ports: Some(exposed_ports),
        host_config: Some(HostConfig {
            port_bindings: Some(port_bindings),
            auto_remove: Some(spec.auto_remove),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn status_code(e: &BollardError) -> Option<u16> {
    match e {
        BollardError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

#[async_trait]
impl Provisioner for DockerProvisioner {
    async fn start(&self, spec: &ContainerConfig) -> Result<InstanceHandle> {
        if spec.pull {
            self.ensure_image(&spec.image).await?;
        }

        let created = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, create_config(spec))
            .await
            .map_err(|e| Error::Provisioning(format!("create container failed: {}", e)))?;
        for warning in &created.warnings {
            tracing::warn!(id = %created.id, "{}", warning);
        }

        if let Err(e) = self
            .docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
        {
            if let Err(cleanup) = self.remove(&created.id).await {
                tracing::warn!(id = %created.id, "failed to remove unstarted container: {}", cleanup);
            }
            return Err(Error::Provisioning(format!("start container failed: {}", e)));
        }

        Ok(InstanceHandle {
            id: created.id,
            image: spec.image.clone(),
            ports: spec.ports.clone(),
            auto_remove: spec.auto_remove,
        })
    }

    async fn stop(&self, handle: &InstanceHandle) -> Result<()> {
        let options = StopContainerOptions {
            t: i64::try_from(self.stop_timeout_secs).unwrap_or(i64::MAX),
        };
        match self.docker.stop_container(&handle.id, Some(options)).await {
            Ok(()) => {}
            // 304: already stopped
            Err(e) if status_code(&e) == Some(304) => {}
            Err(e) => return Err(Error::teardown(&handle.id, e.to_string())),
        }
        tracing::debug!(id = handle.short_id(), "container stopped");

        if !handle.auto_remove {
            self.remove(&handle.id)
                .await
                .map_err(|e| Error::teardown(&handle.id, format!("remove failed: {}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::PortMapping;

    #[test]
    fn test_create_config_publishes_ports() {
        let spec = ContainerConfig {
            ports: vec![
                PortMapping {
                    host: 18080,
                    container: 8080,
                },
                PortMapping {
                    host: 8081,
                    container: 8081,
                },
            ],
            ..Default::default()
        };

        let config = create_config(&spec);

        assert_eq!(config.image.as_deref(), Some("apache/nifi:1.12.1"));
        let exposed = config.exposed_ports.unwrap();
        assert!(exposed.contains_key("8080/tcp"));
        assert!(exposed.contains_key("8081/tcp"));

        let host = config.host_config.unwrap();
        assert_eq!(host.auto_remove, Some(true));
        let bindings = host.port_bindings.unwrap();
        let api = bindings["8080/tcp"].as_ref().unwrap();
        assert_eq!(api[0].host_port.as_deref(), Some("18080"));
    }
}
