// ABOUTME: Generic rollout struct parameterized by state marker.
// ABOUTME: Carries the app identity, revision, and the drain-target snapshot.

use std::marker::PhantomData;

use crate::runtime::ContainerSummary;
use crate::types::{AppName, ContainerId, Revision};

use super::state::{Completed, Initialized, Started};

/// A rollout in progress, parameterized by its current state.
///
/// Transitions consume `self` and return the next state, so an invocation
/// can only move `Initialized → ImageBuilt → Started → Drained → Completed`;
/// a failed transition surfaces its error and drops the value, which is the
/// `Failed` terminal state.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) app: AppName,
    pub(crate) revision: Revision,
    /// Running set snapshotted immediately before the new container was
    /// created. This snapshot, not a fresh query, is what gets drained.
    pub(crate) previous: Vec<ContainerSummary>,
    pub(crate) new_container: Option<ContainerId>,
    pub(crate) _state: PhantomData<S>,
}

impl Deployment<Initialized> {
    /// Create a new rollout for a resolved revision.
    pub fn new(app: AppName, revision: Revision) -> Self {
        Deployment {
            app,
            revision,
            previous: Vec::new(),
            new_container: None,
            _state: PhantomData,
        }
    }
}

impl<S> Deployment<S> {
    /// The application identity this rollout belongs to.
    pub fn app(&self) -> &AppName {
        &self.app
    }

    /// The revision being deployed.
    pub fn revision(&self) -> &Revision {
        &self.revision
    }
}

impl Deployment<Started> {
    /// Get the new container ID.
    pub fn new_container(&self) -> &ContainerId {
        self.new_container
            .as_ref()
            .expect("started rollout must have new container")
    }

    /// The containers targeted for draining.
    pub fn drain_targets(&self) -> &[ContainerSummary] {
        &self.previous
    }
}

impl Deployment<Completed> {
    /// Get the new container ID.
    pub fn new_container(&self) -> &ContainerId {
        self.new_container
            .as_ref()
            .expect("completed rollout must have new container")
    }

    /// Consume the rollout and return the running container's ID.
    pub fn finish(self) -> ContainerId {
        self.new_container
            .expect("completed rollout must have new container")
    }
}
