// ABOUTME: Application-wide error types for slipway.
// ABOUTME: Uses thiserror for ergonomic error handling.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    App(#[from] crate::app::AppError),

    #[error(transparent)]
    Archive(#[from] crate::archive::ArchiveError),

    #[error(transparent)]
    Runtime(#[from] crate::runtime::RuntimeError),

    #[error(transparent)]
    Deploy(#[from] crate::deploy::DeployError),

    #[error("invalid application name: {0}")]
    AppName(#[from] crate::types::AppNameError),

    #[error(
        "running as non-{expected} user; enable setuid on the slipway executable and set its owner to {expected}, or pass --no-user-warn"
    )]
    WrongUser { expected: String },

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("aborted by operator")]
    Aborted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
