//! `replay run`

use anyhow::{Context, Result};
use replay_core::config::PathsConfig;
use replay_core::RunContext;
use replay_sandbox::plugin::{self, PluginFactory};

use super::{absolute, load_script};
use crate::cli::RunArgs;

pub fn cmd_run(args: RunArgs) -> Result<()> {
    let script = load_script(&args.script)?;
    let ctx = build_context(&args, PathsConfig::from_env())?;
    let plugins = plugin_chain(args.plugins.as_deref())?;
    tracing::debug!(?ctx, "Run context");

    replay_sandbox::run(&plugins, &ctx, &script)
        .with_context(|| format!("Script {} failed", script.name()))
}

/// Merge flags over the environment config; all paths come out absolute.
fn build_context(args: &RunArgs, config: PathsConfig) -> Result<RunContext> {
    let datastore = absolute(args.datastore.as_deref().unwrap_or(&config.datastore))?;
    let virtualenv_parent_dir = absolute(
        args.virtualenv_parent_directory
            .as_deref()
            .unwrap_or(&config.virtualenv_parent_dir),
    )?;
    let working_directory = args
        .script_working_directory
        .clone()
        .or(config.working_directory)
        .map(|dir| absolute(&dir))
        .transpose()?;

    Ok(RunContext::from_config(&PathsConfig {
        datastore,
        virtualenv_parent_dir,
        working_directory,
        index_url: args.index_url.clone().or(config.index_url),
    }))
}

fn plugin_chain(names: Option<&[String]>) -> Result<Vec<&'static dyn PluginFactory>> {
    match names {
        Some(names) => Ok(plugin::resolve(names)?),
        None => Ok(plugin::default_chain()),
    }
}
