// ABOUTME: Create command implementation.
// ABOUTME: Provisions an application's bare repository and push hook.

use slipway::app;
use slipway::config::Settings;
use slipway::error::Result;
use slipway::output::Output;
use slipway::types::AppName;

/// Initialize the bare git repository for an application and print the
/// remote the operator should add.
pub fn create(settings: &Settings, name: &str, no_user_warn: bool, output: &Output) -> Result<()> {
    super::ensure_deploy_user(settings, no_user_warn)?;

    let app = AppName::new(name)?;
    let apps_dir = settings.apps_dir()?;

    let repo_path = app::create_app(&apps_dir, &app)?;

    let hostname = gethostname::gethostname().to_string_lossy().into_owned();

    output.success("Ready. Add the remote to your project:");
    output.progress(&format!(
        "\t$ git remote add deploy {}@{}:{}",
        settings.deploy_user,
        hostname,
        repo_path.display()
    ));

    Ok(())
}
