//! Docker registry client implementation.

use async_trait::async_trait;
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::image::PushImageOptions;
use conveyor_core::image::{ImageRegistry, ImageTag};
use conveyor_core::{Error, Result};
use futures::StreamExt;
use tracing::{debug, info};

/// Image registry client backed by the local Docker daemon. Pushes go to
/// whatever registry the tag's repository component names; credentials are
/// applied per push.
pub struct DockerRegistry {
    docker: Docker,
    credentials: Option<DockerCredentials>,
}

impl DockerRegistry {
    /// Create a client connected to the local Docker daemon.
    pub fn new() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::Authentication(e.to_string()))?;
        Ok(Self {
            docker,
            credentials: None,
        })
    }

    /// Create with a custom Docker client.
    pub fn with_client(docker: Docker) -> Self {
        Self {
            docker,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: DockerCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

#[async_trait]
impl ImageRegistry for DockerRegistry {
    async fn authenticate(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| Error::Authentication(format!("docker daemon unreachable: {}", e)))?;
        debug!("Docker daemon reachable");
        Ok(())
    }

    async fn push(&self, tag: &ImageTag) -> Result<()> {
        info!(image = %tag, "Pushing image");

        let options = PushImageOptions {
            tag: tag.tag.clone(),
        };

        let mut stream =
            self.docker
                .push_image(&tag.repository, Some(options), self.credentials.clone());

        while let Some(result) = stream.next().await {
            match result {
                Ok(progress) => {
                    if let Some(message) = progress.error {
                        return Err(Error::Push {
                            tag: tag.uri(),
                            message,
                        });
                    }
                    if let Some(status) = progress.status {
                        debug!(status = %status, "Push progress");
                    }
                }
                Err(e) => {
                    return Err(Error::Push {
                        tag: tag.uri(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(image = %tag, "Push complete");
        Ok(())
    }
}
