// ABOUTME: State transition methods for rollout orchestration.
// ABOUTME: Each method consumes self and returns the next state on success.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Duration;

use futures::StreamExt;

use crate::diagnostics::{Diagnostics, Warning};
use crate::runtime::{
    BuildContext, ContainerConfig, ContainerFilters, ContainerOps, ImageOps, StateFilter,
};
use crate::types::{APP_LABEL, ContainerId, REVISION_LABEL};

use super::Deployment;
use super::error::DeployError;
use super::state::{Completed, Drained, ImageBuilt, Initialized, Started};

/// Cap on concurrent stop calls while draining. Stops are independent per
/// container, so they fan out, but the runtime should not be flooded.
const DRAIN_CONCURRENCY: usize = 4;

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> Deployment<S> {
    /// Internal helper to transition to a new state.
    fn transition<T>(self) -> Deployment<T> {
        Deployment {
            app: self.app,
            revision: self.revision,
            previous: self.previous,
            new_container: self.new_container,
            _state: PhantomData,
        }
    }

    /// Labels attached to the image and to every container this rollout
    /// creates. The app label is the sole discovery key; the revision label
    /// is inert traceability metadata.
    fn labels(&self) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert(APP_LABEL.to_string(), self.app.to_string());
        labels.insert(REVISION_LABEL.to_string(), self.revision.to_string());
        labels
    }

    /// Generate a container name for this rollout.
    ///
    /// The random suffix only avoids name collisions with containers left by
    /// prior rollouts of the same application; it carries no ordering or
    /// cross-restart uniqueness guarantee.
    fn container_name(&self) -> String {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", self.app, &uuid[..8])
    }
}

// =============================================================================
// Initialized -> ImageBuilt
// =============================================================================

impl Deployment<Initialized> {
    /// Build the image from a streamed tar context, tagging it with the
    /// application's single tag and attaching the identity and revision
    /// labels. Build log lines are forwarded to `on_log` as they arrive.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::BuildFailed`; no containers have been touched.
    #[must_use = "deployment state must be used"]
    pub async fn build<R: ImageOps>(
        self,
        runtime: &R,
        context: BuildContext,
        mut on_log: impl FnMut(&str) + Send,
    ) -> Result<Deployment<ImageBuilt>, DeployError> {
        let mut log = runtime.build_image(context, &self.app.image_tag(), &self.labels());

        while let Some(item) = log.next().await {
            match item {
                Ok(line) => {
                    let line = line.trim_end();
                    if !line.is_empty() {
                        on_log(line);
                    }
                }
                Err(e) => return Err(DeployError::BuildFailed(e.to_string())),
            }
        }

        Ok(self.transition())
    }
}

// =============================================================================
// ImageBuilt -> Started
// =============================================================================

impl Deployment<ImageBuilt> {
    /// Snapshot the application's running set, then create and start a new
    /// container from the freshly built image.
    ///
    /// The snapshot is taken immediately before the create call so it can
    /// never include the container this rollout creates; it is stored as the
    /// drain target for the next transition.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::ContainerListFailed` if the snapshot query
    /// fails, `DeployError::ContainerStartFailed` if create or start fails.
    /// A created-but-not-started container is left in place; the image stays
    /// tagged either way.
    #[must_use = "deployment state must be used"]
    pub async fn start_container<R: ContainerOps>(
        self,
        runtime: &R,
    ) -> Result<Deployment<Started>, DeployError> {
        let previous = runtime
            .list_containers(&ContainerFilters::for_app(&self.app, StateFilter::Running))
            .await
            .map_err(|e| DeployError::ContainerListFailed(e.to_string()))?;

        let config = ContainerConfig {
            name: self.container_name(),
            image: self.app.image_ref(),
            labels: self.labels(),
        };

        let container_id = runtime
            .create_container(&config)
            .await
            .map_err(|e| DeployError::ContainerStartFailed(e.to_string()))?;

        runtime
            .start_container(&container_id)
            .await
            .map_err(|e| DeployError::ContainerStartFailed(e.to_string()))?;

        Ok(Deployment {
            app: self.app,
            revision: self.revision,
            previous,
            new_container: Some(container_id),
            _state: PhantomData,
        })
    }
}

// =============================================================================
// Started -> Drained
// =============================================================================

impl Deployment<Started> {
    /// Gracefully stop every container in the pre-start snapshot.
    ///
    /// Stops fan out with a bounded concurrency cap and are joined before
    /// returning. Draining is best effort: a stop failure is recorded as a
    /// warning and the remaining containers are still stopped. The new
    /// container is live throughout; there is no readiness gate between its
    /// start and this drain.
    #[must_use = "deployment state must be used"]
    pub async fn drain<R: ContainerOps>(
        self,
        runtime: &R,
        grace_period: Duration,
        diag: &mut Diagnostics,
    ) -> Deployment<Drained> {
        let failures: Vec<(ContainerId, String)> =
            futures::stream::iter(self.previous.iter().map(|c| c.id.clone()))
                .map(|id| async move {
                    let result = runtime.stop_container(&id, grace_period).await;
                    (id, result)
                })
                .buffer_unordered(DRAIN_CONCURRENCY)
                .filter_map(|(id, result)| async move { result.err().map(|e| (id, e.to_string())) })
                .collect()
                .await;

        for (id, error) in failures {
            diag.warn(Warning::container_stop(format!(
                "failed to stop container {}: {}",
                id, error
            )));
        }

        self.transition()
    }
}

// =============================================================================
// Drained -> Completed
// =============================================================================

impl Deployment<Drained> {
    /// Remove the application's exited containers.
    ///
    /// This re-queries the runtime rather than reusing the drain snapshot:
    /// the fresh query picks up both previously-exited containers and the
    /// ones the drain just stopped. Removal is per-container best effort,
    /// never forced, and never touches volumes.
    #[must_use = "deployment state must be used"]
    pub async fn prune<R: ContainerOps>(
        self,
        runtime: &R,
        diag: &mut Diagnostics,
    ) -> Deployment<Completed> {
        let exited = match runtime
            .list_containers(&ContainerFilters::for_app(&self.app, StateFilter::Exited))
            .await
        {
            Ok(containers) => containers,
            Err(e) => {
                diag.warn(Warning::container_remove(format!(
                    "failed to list exited containers: {}",
                    e
                )));
                Vec::new()
            }
        };

        for container in exited {
            if let Err(e) = runtime.remove_container(&container.id, false).await {
                diag.warn(Warning::container_remove(format!(
                    "failed to remove container {}: {}",
                    container.id, e
                )));
            }
        }

        self.transition()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::traits::sealed::Sealed;
    use crate::runtime::{
        BuildLogStream, ContainerError, ContainerSummary, ImageError, ImageOps, ImageSummary,
    };
    use crate::types::{AppName, ImageId, Revision};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    const REVISION: &str = "0123456789abcdef0123456789abcdef01234567";

    #[derive(Debug, Clone)]
    struct FakeContainer {
        id: String,
        name: String,
        state: String,
        labels: HashMap<String, String>,
    }

    /// In-memory stand-in for the container runtime. Stop and remove
    /// failures can be injected per container id.
    #[derive(Default)]
    struct FakeRuntime {
        containers: Mutex<Vec<FakeContainer>>,
        builds: Mutex<Vec<(String, HashMap<String, String>)>>,
        stop_calls: Mutex<Vec<String>>,
        remove_calls: Mutex<Vec<String>>,
        fail_stop: HashSet<String>,
        fail_remove: HashSet<String>,
        fail_build: bool,
        next_id: AtomicU32,
    }

    impl FakeRuntime {
        fn seed(&self, id: &str, state: &str, app: &str) {
            let mut labels = HashMap::new();
            labels.insert(APP_LABEL.to_string(), app.to_string());
            self.containers.lock().unwrap().push(FakeContainer {
                id: id.to_string(),
                name: format!("{}-{}", app, id),
                state: state.to_string(),
                labels,
            });
        }

        fn state_of(&self, id: &str) -> Option<String> {
            self.containers
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.state.clone())
        }

        fn stop_calls(&self) -> Vec<String> {
            self.stop_calls.lock().unwrap().clone()
        }

        fn remove_calls(&self) -> Vec<String> {
            self.remove_calls.lock().unwrap().clone()
        }
    }

    impl Sealed for FakeRuntime {}

    #[async_trait]
    impl ContainerOps for FakeRuntime {
        async fn create_container(
            &self,
            config: &ContainerConfig,
        ) -> Result<ContainerId, ContainerError> {
            let id = format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            self.containers.lock().unwrap().push(FakeContainer {
                id: id.clone(),
                name: config.name.clone(),
                state: "created".to_string(),
                labels: config.labels.clone(),
            });
            Ok(ContainerId::new(id))
        }

        async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
            let mut containers = self.containers.lock().unwrap();
            let container = containers
                .iter_mut()
                .find(|c| c.id == id.as_str())
                .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
            container.state = "running".to_string();
            Ok(())
        }

        async fn stop_container(
            &self,
            id: &ContainerId,
            _grace_period: Duration,
        ) -> Result<(), ContainerError> {
            self.stop_calls.lock().unwrap().push(id.to_string());
            if self.fail_stop.contains(id.as_str()) {
                return Err(ContainerError::Runtime("injected stop failure".to_string()));
            }
            let mut containers = self.containers.lock().unwrap();
            let container = containers
                .iter_mut()
                .find(|c| c.id == id.as_str())
                .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
            container.state = "exited".to_string();
            Ok(())
        }

        async fn remove_container(
            &self,
            id: &ContainerId,
            force: bool,
        ) -> Result<(), ContainerError> {
            self.remove_calls.lock().unwrap().push(id.to_string());
            if self.fail_remove.contains(id.as_str()) {
                return Err(ContainerError::Runtime(
                    "injected remove failure".to_string(),
                ));
            }
            let mut containers = self.containers.lock().unwrap();
            let position = containers
                .iter()
                .position(|c| c.id == id.as_str())
                .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
            if containers[position].state == "running" && !force {
                return Err(ContainerError::Runtime(
                    "cannot remove running container".to_string(),
                ));
            }
            containers.remove(position);
            Ok(())
        }

        async fn list_containers(
            &self,
            filters: &ContainerFilters,
        ) -> Result<Vec<ContainerSummary>, ContainerError> {
            let containers = self.containers.lock().unwrap();
            Ok(containers
                .iter()
                .filter(|c| {
                    filters
                        .labels
                        .iter()
                        .all(|(k, v)| c.labels.get(k) == Some(v))
                })
                .filter(|c| match filters.state {
                    StateFilter::Any => true,
                    StateFilter::Running => c.state == "running",
                    StateFilter::Exited => c.state == "exited",
                })
                .map(|c| ContainerSummary {
                    id: ContainerId::new(c.id.clone()),
                    name: c.name.clone(),
                    image: "slipway/demo:latest".to_string(),
                    state: c.state.clone(),
                    labels: c.labels.clone(),
                })
                .collect())
        }
    }

    #[async_trait]
    impl ImageOps for FakeRuntime {
        fn build_image(
            &self,
            _context: BuildContext,
            tag: &str,
            labels: &HashMap<String, String>,
        ) -> BuildLogStream<'_> {
            self.builds
                .lock()
                .unwrap()
                .push((tag.to_string(), labels.clone()));

            if self.fail_build {
                return futures::stream::iter(vec![Err(ImageError::BuildFailed(
                    "missing build instructions".to_string(),
                ))])
                .boxed();
            }

            futures::stream::iter(vec![
                Ok("Step 1/2 : FROM scratch".to_string()),
                Ok("Successfully built".to_string()),
            ])
            .boxed()
        }

        async fn list_images(
            &self,
            _labels: &HashMap<String, String>,
        ) -> Result<Vec<ImageSummary>, ImageError> {
            let builds = self.builds.lock().unwrap();
            let mut tags: Vec<String> = Vec::new();
            let mut images = Vec::new();
            for (tag, labels) in builds.iter() {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                    images.push(ImageSummary {
                        id: ImageId::new(format!("sha256:{}", tag.replace('/', "-"))),
                        repo_tags: vec![format!("{}:latest", tag)],
                        labels: labels.clone(),
                    });
                }
            }
            Ok(images)
        }

        async fn remove_image(&self, _id: &ImageId, _force: bool) -> Result<(), ImageError> {
            Ok(())
        }
    }

    fn demo_rollout() -> Deployment<Initialized> {
        Deployment::new(
            AppName::new("demo").unwrap(),
            Revision::new(REVISION).unwrap(),
        )
    }

    fn empty_context() -> BuildContext {
        BuildContext::empty()
    }

    #[tokio::test]
    async fn first_deploy_starts_one_container_and_drains_nothing() {
        let runtime = FakeRuntime::default();
        let mut diag = Diagnostics::default();

        let rollout = demo_rollout()
            .build(&runtime, empty_context(), |_| {})
            .await
            .unwrap()
            .start_container(&runtime)
            .await
            .unwrap();

        assert!(rollout.drain_targets().is_empty());

        let rollout = rollout
            .drain(&runtime, Duration::from_secs(10), &mut diag)
            .await
            .prune(&runtime, &mut diag)
            .await;

        assert!(runtime.stop_calls().is_empty());
        assert!(runtime.remove_calls().is_empty());
        assert!(!diag.has_warnings());

        let new_id = rollout.finish();
        assert_eq!(runtime.state_of(new_id.as_str()).unwrap(), "running");
    }

    #[tokio::test]
    async fn build_log_lines_are_forwarded() {
        let runtime = FakeRuntime::default();
        let mut lines = Vec::new();

        let context = BuildContext::from_bytes(bytes::Bytes::from_static(b"tar bytes"));
        demo_rollout()
            .build(&runtime, context, |line| lines.push(line.to_string()))
            .await
            .unwrap();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("FROM scratch"));
    }

    #[tokio::test]
    async fn build_failure_touches_no_containers() {
        let runtime = FakeRuntime {
            fail_build: true,
            ..Default::default()
        };
        runtime.seed("old", "running", "demo");

        let err = demo_rollout()
            .build(&runtime, empty_context(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::BuildFailed(_)));
        assert_eq!(runtime.containers.lock().unwrap().len(), 1);
        assert_eq!(runtime.state_of("old").unwrap(), "running");
        assert!(runtime.stop_calls().is_empty());
    }

    #[tokio::test]
    async fn drain_targets_only_the_pre_start_snapshot() {
        let runtime = FakeRuntime::default();
        runtime.seed("old-a", "running", "demo");

        let mut diag = Diagnostics::default();
        let rollout = demo_rollout()
            .build(&runtime, empty_context(), |_| {})
            .await
            .unwrap()
            .start_container(&runtime)
            .await
            .unwrap();

        let targets: Vec<&str> = rollout
            .drain_targets()
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(targets, vec!["old-a"]);

        let new_id = rollout.new_container().clone();
        let rollout = rollout
            .drain(&runtime, Duration::from_secs(10), &mut diag)
            .await;

        // Only the snapshot was stopped, never the container just created.
        assert_eq!(runtime.stop_calls(), vec!["old-a".to_string()]);
        assert_eq!(runtime.state_of(new_id.as_str()).unwrap(), "running");

        let _ = rollout.prune(&runtime, &mut diag).await;
    }

    #[tokio::test]
    async fn stop_failure_is_non_fatal_and_pruning_still_runs() {
        let mut fail_stop = HashSet::new();
        fail_stop.insert("old-a".to_string());
        let runtime = FakeRuntime {
            fail_stop,
            ..Default::default()
        };
        runtime.seed("old-a", "running", "demo");
        runtime.seed("old-b", "running", "demo");

        let mut diag = Diagnostics::default();
        let rollout = demo_rollout()
            .build(&runtime, empty_context(), |_| {})
            .await
            .unwrap()
            .start_container(&runtime)
            .await
            .unwrap();

        let new_id = rollout.new_container().clone();
        let rollout = rollout
            .drain(&runtime, Duration::from_secs(10), &mut diag)
            .await;

        // Both stops were attempted despite the first failing.
        let mut stops = runtime.stop_calls();
        stops.sort();
        assert_eq!(stops, vec!["old-a".to_string(), "old-b".to_string()]);
        assert_eq!(diag.warnings().len(), 1);

        let rollout = rollout.prune(&runtime, &mut diag).await;

        // Pruning executed and removed the container that did stop.
        assert_eq!(runtime.remove_calls(), vec!["old-b".to_string()]);
        assert_eq!(runtime.state_of(new_id.as_str()).unwrap(), "running");
        let _ = rollout.finish();
    }

    #[tokio::test]
    async fn prune_remove_failure_continues_with_remaining() {
        let mut fail_remove = HashSet::new();
        fail_remove.insert("dead-a".to_string());
        let runtime = FakeRuntime {
            fail_remove,
            ..Default::default()
        };
        runtime.seed("dead-a", "exited", "demo");
        runtime.seed("dead-b", "exited", "demo");

        let mut diag = Diagnostics::default();
        let rollout = demo_rollout()
            .build(&runtime, empty_context(), |_| {})
            .await
            .unwrap()
            .start_container(&runtime)
            .await
            .unwrap()
            .drain(&runtime, Duration::from_secs(10), &mut diag)
            .await
            .prune(&runtime, &mut diag)
            .await;

        assert_eq!(runtime.remove_calls().len(), 2);
        assert!(runtime.state_of("dead-a").is_some(), "failed remove stays");
        assert!(runtime.state_of("dead-b").is_none(), "other remove proceeds");
        assert_eq!(diag.warnings().len(), 1);
        let _ = rollout.finish();
    }

    #[tokio::test]
    async fn prune_picks_up_just_drained_containers() {
        let runtime = FakeRuntime::default();
        runtime.seed("old-a", "running", "demo");

        let mut diag = Diagnostics::default();
        let rollout = demo_rollout()
            .build(&runtime, empty_context(), |_| {})
            .await
            .unwrap()
            .start_container(&runtime)
            .await
            .unwrap()
            .drain(&runtime, Duration::from_secs(10), &mut diag)
            .await
            .prune(&runtime, &mut diag)
            .await;

        // The drained container was exited by the stop call, then removed by
        // the pruning re-query.
        assert_eq!(runtime.remove_calls(), vec!["old-a".to_string()]);
        assert!(runtime.state_of("old-a").is_none());
        assert!(!diag.has_warnings());
        let _ = rollout.finish();
    }

    #[tokio::test]
    async fn created_container_carries_identity_and_revision_labels() {
        let runtime = FakeRuntime::default();

        let rollout = demo_rollout()
            .build(&runtime, empty_context(), |_| {})
            .await
            .unwrap()
            .start_container(&runtime)
            .await
            .unwrap();

        let id = rollout.new_container().clone();
        let containers = runtime.containers.lock().unwrap();
        let created = containers.iter().find(|c| c.id == id.as_str()).unwrap();
        assert_eq!(created.labels.get(APP_LABEL), Some(&"demo".to_string()));
        assert_eq!(
            created.labels.get(REVISION_LABEL),
            Some(&REVISION.to_string())
        );
        assert!(created.name.starts_with("demo-"));
    }

    #[tokio::test]
    async fn repeated_builds_reuse_the_same_image_tag() {
        let runtime = FakeRuntime::default();

        for _ in 0..2 {
            demo_rollout()
                .build(&runtime, empty_context(), |_| {})
                .await
                .unwrap();
        }

        let builds = runtime.builds.lock().unwrap();
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].0, "slipway/demo");
        assert_eq!(builds[0].0, builds[1].0);
        drop(builds);

        // Two consecutive builds leave exactly one current image.
        let images = runtime.list_images(&HashMap::new()).await.unwrap();
        assert_eq!(images.len(), 1);
    }

    #[tokio::test]
    async fn container_names_differ_across_rollouts() {
        let runtime = FakeRuntime::default();

        for _ in 0..2 {
            demo_rollout()
                .build(&runtime, empty_context(), |_| {})
                .await
                .unwrap()
                .start_container(&runtime)
                .await
                .unwrap();
        }

        let containers = runtime.containers.lock().unwrap();
        assert_eq!(containers.len(), 2);
        assert_ne!(containers[0].name, containers[1].name);
    }
}
