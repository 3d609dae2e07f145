// ABOUTME: Entry point for the slipway CLI application.
// ABOUTME: Parses arguments, dispatches commands, and races Ctrl-C cancellation.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use slipway::config::Settings;
use slipway::error::{Error, Result};
use slipway::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Output::new(mode);

    // An operator interrupt drops the in-flight command future, which
    // cancels the current runtime call; no partial rollback is attempted.
    let result = tokio::select! {
        result = run(cli, output) => result,
        _ = tokio::signal::ctrl_c() => Err(Error::Aborted),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mut output: Output) -> Result<()> {
    let settings = Settings::load()?;

    match cli.command {
        Commands::Create { app } => commands::create(&settings, &app, cli.no_user_warn, &output),
        Commands::Destroy { app } => {
            commands::destroy(&settings, &app, cli.no_user_warn, &output).await
        }
        Commands::DeployRepo {
            app,
            repo_dir,
            branch,
        } => commands::deploy_repo(&settings, &app, &repo_dir, &branch, &mut output).await,
    }
}
