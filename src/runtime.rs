//! Container runtime access
//!
//! The pollers list running containers and the control API starts them.
//! Both go through the [`ContainerRuntime`] trait; [`DockerRuntime`] is the
//! bollard-backed implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{
    ListContainersOptionsBuilder, StartContainerOptions, StartContainerOptionsBuilder,
};
use tracing::{debug, info, instrument, trace};

/// One running container as reported by the runtime
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSummary {
    /// Full runtime id
    pub id: String,
    pub image: String,
    pub state: String,
    pub status: String,
    /// Creation time (unix seconds)
    pub created: Option<i64>,
    pub network_mode: String,
}

/// Trait for container runtimes
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// List the currently running containers
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>>;

    /// Start the container with the given id (or id prefix)
    async fn start_container(&self, id: &str) -> Result<()>;
}

/// Docker engine through bollard
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to `socket`, or to the local defaults when `None`.
    pub fn connect(socket: Option<&str>) -> Result<Self> {
        let docker = match socket {
            Some(path) => {
                debug!("connecting to docker at {path}");
                Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION)
                    .with_context(|| format!("failed to connect to docker at {path}"))?
            }
            None => {
                debug!("connecting to docker with local defaults");
                Docker::connect_with_local_defaults()
                    .context("failed to connect to docker daemon")?
            }
        };

        Ok(Self { docker })
    }

    /// Check that the daemon answers.
    pub async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .context("docker daemon did not answer ping")?;
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        let options = ListContainersOptionsBuilder::new().all(false).build();
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .context("failed to list containers")?;

        trace!("docker reported {} running containers", containers.len());

        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: c.id.unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                state: c.state.map(|s| s.to_string()).unwrap_or_default(),
                status: c.status.unwrap_or_default(),
                created: c.created,
                network_mode: c
                    .host_config
                    .and_then(|h| h.network_mode)
                    .unwrap_or_default(),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn start_container(&self, id: &str) -> Result<()> {
        let options: StartContainerOptions = StartContainerOptionsBuilder::new().build();
        self.docker
            .start_container(id, Some(options))
            .await
            .with_context(|| format!("failed to start container {id}"))?;

        info!("container {id} started successfully");
        Ok(())
    }
}
