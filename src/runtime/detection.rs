// ABOUTME: Local control-socket detection for Docker and Podman.
// ABOUTME: Checks Podman sockets first, then Docker; explicit override wins.

use super::types::{RuntimeEndpoint, RuntimeType};
use std::path::Path;

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,
}

/// Detect the container runtime on the local system.
///
/// An explicit socket path short-circuits detection; its runtime type is
/// guessed from the path. Otherwise detection order:
/// 1. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman socket (`/run/podman/podman.sock`)
/// 3. Docker socket (`/var/run/docker.sock`)
pub fn detect_local(socket_override: Option<&str>) -> Result<RuntimeEndpoint, DetectionError> {
    if let Some(socket) = socket_override {
        let runtime_type = if socket.contains("podman") {
            RuntimeType::Podman
        } else {
            RuntimeType::Docker
        };
        return Ok(RuntimeEndpoint {
            runtime_type,
            socket_path: socket.to_string(),
        });
    }

    // 1. Rootless Podman
    if let Some(uid) = get_uid() {
        let rootless_socket = format!("/run/user/{}/podman/podman.sock", uid);
        if Path::new(&rootless_socket).exists() {
            return Ok(RuntimeEndpoint {
                runtime_type: RuntimeType::Podman,
                socket_path: rootless_socket,
            });
        }
    }

    // 2. Rootful Podman
    if Path::new(ROOTFUL_PODMAN).exists() {
        return Ok(RuntimeEndpoint {
            runtime_type: RuntimeType::Podman,
            socket_path: ROOTFUL_PODMAN.to_string(),
        });
    }

    // 3. Docker
    if Path::new(DOCKER_SOCKET).exists() {
        return Ok(RuntimeEndpoint {
            runtime_type: RuntimeType::Docker,
            socket_path: DOCKER_SOCKET.to_string(),
        });
    }

    Err(DetectionError::NoRuntimeFound)
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        // Fall back to reading /proc/self/status
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}
