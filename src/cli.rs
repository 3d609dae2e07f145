// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "slipway")]
#[command(about = "Push-to-deploy release controller for Docker and Podman")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Minimal output (CI)
    #[arg(long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON events instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable warning when setuid is not set
    #[arg(short = 'u', long, global = true)]
    pub no_user_warn: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initializes the git repository for an application
    Create {
        /// Application name
        app: String,
    },

    /// Removes the git repository and cleans up containers and images
    Destroy {
        /// Application name
        app: String,
    },

    /// Deploys a pushed revision (invoked by the post-receive hook)
    #[command(name = "deploy-repo", hide = true)]
    DeployRepo {
        /// Application name
        app: String,

        /// Path to the bare repository
        repo_dir: PathBuf,

        /// Branch to deploy
        #[arg(long, default_value = "master")]
        branch: String,
    },
}
