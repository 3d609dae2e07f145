// ABOUTME: Rollout orchestration using the type state pattern.
// ABOUTME: Exports state markers and the Deployment struct for compile-time safe rollouts.

mod deployment;
mod error;
mod state;
mod transitions;

pub use deployment::Deployment;
pub use error::DeployError;
pub use state::{Completed, Drained, ImageBuilt, Initialized, Started};
