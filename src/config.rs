// ABOUTME: Host-level settings for the controller, from an optional YAML file.
// ABOUTME: Covers runtime socket, stop grace period, deploy user, and apps dir.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable pointing at an explicit settings file.
pub const CONFIG_ENV: &str = "SLIPWAY_CONFIG";

/// Environment variable overriding the runtime socket path.
pub const SOCKET_ENV: &str = "SLIPWAY_SOCKET";

/// Settings file looked up in the deploy user's home directory.
pub const CONFIG_FILENAME: &str = ".slipway.yml";

/// Host-level settings. Every field has a default; a missing settings file
/// is not an error.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Explicit runtime socket path (overrides auto-detection).
    #[serde(default)]
    pub socket: Option<String>,

    /// Grace period for stopping previous containers before the runtime
    /// escalates to a forced kill.
    #[serde(default = "default_stop_grace_period", with = "humantime_serde")]
    pub stop_grace_period: Duration,

    /// The user pushes are expected to arrive as.
    #[serde(default = "default_deploy_user")]
    pub deploy_user: String,

    /// Directory holding the applications' bare repositories. Defaults to
    /// the current user's home directory.
    #[serde(default)]
    pub apps_dir: Option<PathBuf>,
}

fn default_stop_grace_period() -> Duration {
    Duration::from_secs(10)
}

fn default_deploy_user() -> String {
    "slipway".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            socket: None,
            stop_grace_period: default_stop_grace_period(),
            deploy_user: default_deploy_user(),
            apps_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from `$SLIPWAY_CONFIG`, falling back to
    /// `$HOME/.slipway.yml`, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = match std::env::var(CONFIG_ENV) {
            Ok(explicit) => PathBuf::from(explicit),
            Err(_) => match std::env::var("HOME") {
                Ok(home) => PathBuf::from(home).join(CONFIG_FILENAME),
                Err(_) => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    /// The runtime socket to use, if any: `$SLIPWAY_SOCKET` wins over the
    /// settings file.
    pub fn socket(&self) -> Option<String> {
        std::env::var(SOCKET_ENV).ok().or_else(|| self.socket.clone())
    }

    /// Directory holding the bare repositories.
    pub fn apps_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.apps_dir {
            return Ok(dir.clone());
        }
        std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| Error::MissingEnvVar("HOME".to_string()))
    }
}
