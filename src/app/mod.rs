// ABOUTME: Application provisioning and destruction.
// ABOUTME: Bare repository setup with a push hook, and full teardown of an app.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::runtime::{ContainerFilters, ContainerOps, ImageOps, StateFilter};
use crate::types::{APP_LABEL, AppName};

/// Errors from application provisioning and destruction.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("application already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("no such application: {0}")]
    NoSuchApp(String),

    #[error("failed to initialize repository: {0}")]
    Init(String),

    #[error("failed to query runtime: {0}")]
    Cleanup(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Path of an application's bare repository.
pub fn repo_path(apps_dir: &Path, app: &AppName) -> PathBuf {
    apps_dir.join(format!("{}.git", app))
}

/// Initialize the bare repository for an application and install the
/// push hook that triggers deployment.
///
/// Returns the repository path. Fails with `AppError::AlreadyExists` if the
/// repository directory is already present.
pub fn create_app(apps_dir: &Path, app: &AppName) -> Result<PathBuf, AppError> {
    let repo_path = repo_path(apps_dir, app);

    if repo_path.exists() {
        return Err(AppError::AlreadyExists(repo_path));
    }

    gix::init_bare(&repo_path).map_err(|e| AppError::Init(e.to_string()))?;

    let hooks_dir = repo_path.join("hooks");
    std::fs::create_dir_all(&hooks_dir)?;

    let hook_path = hooks_dir.join("post-receive");
    let script = format!("#!/bin/sh\n\nslipway deploy-repo {} \"$(pwd)\"\n", app);
    std::fs::write(&hook_path, script)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&hook_path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&hook_path, perms)?;
    }

    Ok(repo_path)
}

/// Force-remove every container carrying the application's identity label,
/// in any state. Removal is per-container best effort; returns how many
/// were removed.
pub async fn remove_app_containers<R: ContainerOps>(
    runtime: &R,
    app: &AppName,
) -> Result<usize, AppError> {
    let containers = runtime
        .list_containers(&ContainerFilters::for_app(app, StateFilter::Any))
        .await
        .map_err(|e| AppError::Cleanup(e.to_string()))?;

    let mut removed = 0;
    for container in containers {
        match runtime.remove_container(&container.id, true).await {
            Ok(()) => removed += 1,
            Err(e) => warn!("failed to remove container {}: {}", container.id, e),
        }
    }

    Ok(removed)
}

/// Remove every image carrying the application's identity label. Removal is
/// per-image best effort; returns how many were removed.
pub async fn remove_app_images<R: ImageOps>(runtime: &R, app: &AppName) -> Result<usize, AppError> {
    let mut labels = std::collections::HashMap::new();
    labels.insert(APP_LABEL.to_string(), app.to_string());

    let images = runtime
        .list_images(&labels)
        .await
        .map_err(|e| AppError::Cleanup(e.to_string()))?;

    let mut removed = 0;
    for image in images {
        match runtime.remove_image(&image.id, false).await {
            Ok(()) => removed += 1,
            Err(e) => warn!("failed to remove image {}: {}", image.id, e),
        }
    }

    Ok(removed)
}

/// Delete the application's bare repository.
pub fn destroy_repo(repo_path: &Path) -> Result<(), AppError> {
    std::fs::remove_dir_all(repo_path)?;
    Ok(())
}
