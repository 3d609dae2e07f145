// ABOUTME: Destroy command implementation.
// ABOUTME: Confirmed teardown of an app's repository, containers, and images.

use std::io::BufRead;

use slipway::app;
use slipway::config::Settings;
use slipway::error::Result;
use slipway::output::Output;
use slipway::runtime::{BollardRuntime, RuntimeError, detect_local};
use slipway::types::AppName;

/// Remove an application: its containers, its images, and its repository.
///
/// Destruction is gated on the operator retyping the application name. A
/// mismatch exits without destroying anything and is not an error.
pub async fn destroy(
    settings: &Settings,
    name: &str,
    no_user_warn: bool,
    output: &Output,
) -> Result<()> {
    super::ensure_deploy_user(settings, no_user_warn)?;

    let app = AppName::new(name)?;
    let apps_dir = settings.apps_dir()?;
    let repo_path = app::repo_path(&apps_dir, &app);

    if !repo_path.exists() {
        return Err(app::AppError::NoSuchApp(app.to_string()).into());
    }

    output.progress(&format!(
        "This operation will destroy the git repository at {} and all of the associated containers and images.",
        repo_path.display()
    ));
    output.progress(&format!(
        "For confirmation, please type the name of the application ({}):",
        app
    ));

    let mut confirmation = String::new();
    std::io::stdin().lock().read_line(&mut confirmation)?;
    let confirmation = confirmation.trim();

    if confirmation != app.as_str() {
        output.progress(&format!(
            "{} != {}. Exiting without destroying application.",
            confirmation, app
        ));
        return Ok(());
    }

    let socket = settings.socket();
    let endpoint = detect_local(socket.as_deref()).map_err(RuntimeError::from)?;
    let runtime = BollardRuntime::connect(&endpoint).map_err(RuntimeError::from)?;

    output.progress("Removing containers...");
    let removed = app::remove_app_containers(&runtime, &app).await?;
    tracing::debug!(removed, "containers removed");

    output.progress("Removing images...");
    let removed = app::remove_app_images(&runtime, &app).await?;
    tracing::debug!(removed, "images removed");

    output.progress(&format!("Destroying {}...", repo_path.display()));
    app::destroy_repo(&repo_path)?;

    output.success("Destroyed");
    Ok(())
}
