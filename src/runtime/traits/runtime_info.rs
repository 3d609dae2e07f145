// ABOUTME: Runtime info trait for container runtimes.
// ABOUTME: Connectivity check and version metadata over the control socket.

use super::sealed::Sealed;
use async_trait::async_trait;

/// Runtime metadata operations.
#[async_trait]
pub trait RuntimeInfo: Sealed + Send + Sync {
    /// Get runtime version and metadata.
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError>;

    /// Ping the runtime to check connectivity.
    async fn ping(&self) -> Result<(), RuntimeInfoError>;
}

/// Runtime metadata.
#[derive(Debug, Clone)]
pub struct RuntimeMetadata {
    /// Runtime name (e.g., "Docker", "Podman").
    pub name: String,
    /// Runtime version.
    pub version: String,
    /// API version.
    pub api_version: String,
}

/// Errors from runtime info operations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeInfoError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
