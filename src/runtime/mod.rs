// ABOUTME: Container runtime client: capability traits, bollard backend,
// ABOUTME: and local socket detection for Docker and Podman.

mod bollard;
mod detection;
mod error;
pub(crate) mod traits;
mod types;

pub use bollard::BollardRuntime;
pub use detection::{DetectionError, detect_local};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;
pub use types::{RuntimeEndpoint, RuntimeType};
