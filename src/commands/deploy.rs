// ABOUTME: Deploy-repo command implementation, invoked by the push hook.
// ABOUTME: Resolves the revision and drives the rollout state machine.

use std::path::Path;

use slipway::archive;
use slipway::config::Settings;
use slipway::deploy::Deployment;
use slipway::diagnostics::Diagnostics;
use slipway::error::Result;
use slipway::output::Output;
use slipway::runtime::{BollardRuntime, RuntimeError, RuntimeInfo, detect_local};
use slipway::types::AppName;

/// Deploy the given branch of a repository as the named application.
///
/// The sequence: resolve revision → stream the build context → build and tag
/// the image → snapshot the running set → start the new container → drain
/// the snapshot → prune exited containers. Failures up through the start are
/// fatal; drain/prune failures are printed as warnings while the rollout
/// still reports success.
pub async fn deploy_repo(
    settings: &Settings,
    name: &str,
    repo_dir: &Path,
    branch: &str,
    output: &mut Output,
) -> Result<()> {
    output.start_timer();

    let app = AppName::new(name)?;

    let socket = settings.socket();
    let endpoint = detect_local(socket.as_deref()).map_err(RuntimeError::from)?;
    let runtime = BollardRuntime::connect(&endpoint).map_err(RuntimeError::from)?;
    runtime.ping().await.map_err(RuntimeError::from)?;
    let meta = runtime.info().await.map_err(RuntimeError::from)?;

    let revision = archive::resolve_branch(repo_dir, branch)?;
    output.progress(&format!(
        "Deploying {} at {} via {} {}",
        app,
        revision.short(),
        meta.name,
        meta.version
    ));

    let (context, worker) = archive::stream_archive(repo_dir, &revision);

    let rollout = Deployment::new(app, revision);

    let built = {
        let out: &Output = output;
        rollout
            .build(&runtime, context, |line| out.build_line(line))
            .await
    };

    // The producer closes the pipe on error, which surfaces to the builder
    // as a truncated context; conversely a failed build drops the pipe under
    // a healthy producer. Join the producer and report the root cause.
    let rollout = match (built, worker.finish().await) {
        (Ok(rollout), Ok(())) => rollout,
        (Ok(rollout), Err(archive::ArchiveError::ConsumerClosed)) => rollout,
        (Ok(_), Err(e)) => return Err(e.into()),
        (Err(_), Err(e @ (archive::ArchiveError::RevisionNotFound(_) | archive::ArchiveError::Io(_)))) => {
            return Err(e.into());
        }
        (Err(build_err), _) => return Err(build_err.into()),
    };

    output.progress("Starting new containers...");
    let rollout = rollout.start_container(&runtime).await?;

    let mut diag = Diagnostics::default();

    output.progress("Stopping previous containers...");
    let rollout = rollout
        .drain(&runtime, settings.stop_grace_period, &mut diag)
        .await;

    output.progress("Removing exited containers...");
    let rollout = rollout.prune(&runtime, &mut diag).await;

    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    let container = rollout.finish();
    tracing::debug!(container = %container, "rollout complete");

    output.success("Ready");
    Ok(())
}
