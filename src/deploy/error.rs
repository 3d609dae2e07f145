// ABOUTME: Fatal error types for rollout transitions.
// ABOUTME: Anything up through the new container's start aborts the rollout.

use crate::runtime::ImageError;

/// Errors that abort a rollout.
///
/// Only failures up through and including the new container's start are
/// fatal. Stop and remove failures during draining and pruning are reported
/// as [`crate::diagnostics::Warning`]s instead; they never flip a rollout
/// that started its new container into a failure.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Image build failed; no containers were touched.
    #[error("build failed: {0}")]
    BuildFailed(String),

    /// Could not query the runtime for the application's containers.
    #[error("failed to list containers: {0}")]
    ContainerListFailed(String),

    /// Creating or starting the new container failed. The built image stays
    /// tagged for the next attempt to overwrite.
    #[error("failed to start container: {0}")]
    ContainerStartFailed(String),
}

impl From<ImageError> for DeployError {
    fn from(err: ImageError) -> Self {
        DeployError::BuildFailed(err.to_string())
    }
}
