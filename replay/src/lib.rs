//! replay CLI library.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

/// Parse arguments and dispatch to the command handlers.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    replay_core::observability::init_tracing();

    match cli.command {
        Commands::Run(args) => commands::run::cmd_run(args),
        Commands::Check { script, datastore } => commands::check::cmd_check(&script, datastore),
        Commands::EnvPath {
            script,
            virtualenv_parent_directory,
            json,
        } => commands::env_path::cmd_env_path(&script, virtualenv_parent_directory, json),
        Commands::Plugins => {
            commands::cmd_plugins();
            Ok(())
        }
    }
}
