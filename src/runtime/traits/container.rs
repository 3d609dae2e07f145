// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: Create, start, stop, remove, and list containers by label and state.

use super::sealed::Sealed;
use crate::types::{APP_LABEL, AppName, ContainerId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Sealed + Send + Sync {
    /// Create a container from the given configuration.
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError>;

    /// Start a created container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Stop a running container, escalating to a forced kill after the
    /// grace period elapses.
    async fn stop_container(
        &self,
        id: &ContainerId,
        grace_period: Duration,
    ) -> Result<(), ContainerError>;

    /// Remove a container. Attached volumes are never removed.
    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    /// List containers matching the given filters. An empty result is not
    /// an error; callers must not assume any ordering.
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError>;
}

/// Configuration for creating a container.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Name for the container.
    pub name: String,
    /// Image reference to run.
    pub image: String,
    /// Labels to apply. Applied at creation time and never mutated;
    /// discovery depends on an exact match.
    pub labels: HashMap<String, String>,
}

/// Lifecycle-state filter for container listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateFilter {
    /// Containers in any state.
    Any,
    /// Running containers only.
    #[default]
    Running,
    /// Exited containers only.
    Exited,
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Filter by label (key=value).
    pub labels: HashMap<String, String>,
    /// Filter by lifecycle state.
    pub state: StateFilter,
}

impl ContainerFilters {
    /// Filters selecting every container that belongs to an application,
    /// narrowed by lifecycle state.
    pub fn for_app(app: &AppName, state: StateFilter) -> Self {
        let mut labels = HashMap::new();
        labels.insert(APP_LABEL.to_string(), app.to_string());
        Self { labels, state }
    }
}

/// Summary information about a container.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    /// Container ID.
    pub id: ContainerId,
    /// Container name.
    pub name: String,
    /// Image used.
    pub image: String,
    /// Current state as reported by the runtime.
    pub state: String,
    /// Labels.
    pub labels: HashMap<String, String>,
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
