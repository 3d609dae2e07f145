// ABOUTME: Runtime type definitions for Docker and Podman.
// ABOUTME: Includes RuntimeType enum and the RuntimeEndpoint socket address.

use serde::{Deserialize, Serialize};

/// The container runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "docker"),
            RuntimeType::Podman => write!(f, "podman"),
        }
    }
}

/// A resolved control-plane socket to connect to.
#[derive(Debug, Clone)]
pub struct RuntimeEndpoint {
    /// The type of runtime behind the socket.
    pub runtime_type: RuntimeType,
    /// Path to the runtime socket.
    pub socket_path: String,
}
