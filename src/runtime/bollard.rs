// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Supports both Docker and Podman via Docker-compatible API.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    BuildContext, BuildLogStream, ContainerConfig, ContainerError, ContainerFilters, ContainerOps,
    ContainerSummary, ImageError, ImageOps, ImageSummary, RuntimeInfo, RuntimeInfoError,
    RuntimeMetadata, StateFilter,
};
use crate::runtime::types::{RuntimeEndpoint, RuntimeType};
use crate::types::{ContainerId, ImageId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, ListContainersOptions, ListImagesOptions,
    RemoveContainerOptions, RemoveImageOptions, StopContainerOptions,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_image_remove_error(e: bollard::errors::Error, image: &str) -> ImageError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(image.to_string())
        }
        bollard::errors::Error::DockerResponseServerError { status_code, message }
            if *status_code == 409 =>
        {
            ImageError::InUse(message.clone())
        }
        _ => ImageError::Runtime(format!("failed to remove {}: {}", image, e)),
    }
}

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::ImageNotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ContainerError::AlreadyExists(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => ContainerError::AlreadyRunning(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_stop_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => ContainerError::NotRunning(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime capability object backed by bollard.
///
/// Constructed once from a resolved control socket and passed by reference
/// to every component that talks to the runtime. Supports both Docker and
/// Podman via the Docker-compatible API.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    /// Create a new BollardRuntime from a Docker client.
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to a container runtime at the given endpoint.
    ///
    /// Use with `detect_local()` to resolve the endpoint first.
    pub fn connect(endpoint: &RuntimeEndpoint) -> Result<Self, RuntimeInfoError> {
        let client =
            Docker::connect_with_unix(&endpoint.socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(Self::new(client, endpoint.runtime_type))
    }

    /// Get the runtime type (Docker or Podman).
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }
}

// Implement Sealed trait to allow runtime trait implementations
impl Sealed for BollardRuntime {}

#[async_trait]
impl RuntimeInfo for BollardRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;

        let name = match self.runtime_type {
            RuntimeType::Docker => "Docker".to_string(),
            RuntimeType::Podman => "Podman".to_string(),
        };

        Ok(RuntimeMetadata {
            name,
            version: info.server_version.unwrap_or_default(),
            api_version: bollard::API_DEFAULT_VERSION.to_string(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.client
            .ping()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    fn build_image(
        &self,
        context: BuildContext,
        tag: &str,
        labels: &HashMap<String, String>,
    ) -> BuildLogStream<'_> {
        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: Some(tag.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        };

        let body = bollard::body_stream(context);
        let tag = tag.to_string();

        // The daemon reports build failures inline in the progress stream
        // rather than via HTTP status, so both channels map to BuildFailed.
        let stream = self
            .client
            .build_image(options, None, Some(body))
            .map(move |result| match result {
                Ok(info) => {
                    if let Some(detail) = info.error_detail {
                        Err(ImageError::BuildFailed(
                            detail.message.unwrap_or_else(|| "unknown error".to_string()),
                        ))
                    } else {
                        Ok(info.stream.unwrap_or_default())
                    }
                }
                Err(e) => Err(ImageError::BuildFailed(format!("{}: {}", tag, e))),
            });

        Box::pin(stream)
    }

    async fn list_images(
        &self,
        labels: &HashMap<String, String>,
    ) -> Result<Vec<ImageSummary>, ImageError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        let opts = ListImagesOptions {
            all: false,
            filters: Some(filter_map),
            ..Default::default()
        };

        let images = self
            .client
            .list_images(Some(opts))
            .await
            .map_err(|e| ImageError::Runtime(e.to_string()))?;

        Ok(images
            .into_iter()
            .map(|i| ImageSummary {
                id: ImageId::new(i.id),
                repo_tags: i.repo_tags,
                labels: i.labels,
            })
            .collect())
    }

    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<(), ImageError> {
        let opts = RemoveImageOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_image(id.as_str(), Some(opts), None)
            .await
            .map_err(|e| map_image_remove_error(e, id.as_str()))?;

        Ok(())
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let body = ContainerCreateBody {
            image: Some(config.image.clone()),
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(config.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(map_container_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        grace_period: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(grace_period.as_secs() as i32),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        // Volumes are never removed alongside the container; bollard's
        // RemoveContainerOptions defaults `v` to false.
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)?;

        Ok(())
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();

        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        // Running containers come from the default listing; anything else
        // needs all=true plus a status filter.
        let all = match filters.state {
            StateFilter::Running => false,
            StateFilter::Any => true,
            StateFilter::Exited => {
                filter_map.insert("status".to_string(), vec!["exited".to_string()]);
                true
            }
        };

        let opts = ListContainersOptions {
            all,
            filters: Some(filter_map),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(|e| ContainerError::Runtime(e.to_string()))?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let id = c.id.unwrap_or_default();
                let names = c.names.unwrap_or_default();
                let name = names
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default();

                let state = c
                    .state
                    .map(|s| format!("{:?}", s).to_lowercase())
                    .unwrap_or_default();

                ContainerSummary {
                    id: ContainerId::new(id),
                    name,
                    image: c.image.unwrap_or_default(),
                    state,
                    labels: c.labels.unwrap_or_default(),
                }
            })
            .collect())
    }
}
