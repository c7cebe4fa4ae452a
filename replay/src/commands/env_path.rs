//! `replay env-path`: where a script's dependency environment lives.

use std::path::{Path, PathBuf};

use anyhow::Result;
use replay_core::config::schema::default_virtualenv_parent_dir;
use replay_sandbox::env::{cache_key, env_dir};
use serde::Serialize;

use super::{absolute, load_script};

#[derive(Debug, Serialize)]
struct EnvReport {
    script: String,
    dependencies: Vec<String>,
    cache_key: String,
    path: PathBuf,
    built: bool,
}

fn report(script_path: &Path, parent: Option<PathBuf>) -> Result<EnvReport> {
    let script = load_script(script_path)?;
    let parent = absolute(&parent.unwrap_or_else(default_virtualenv_parent_dir))?;
    let deps = script.python_dependencies();
    let path = env_dir(&parent, deps);
    Ok(EnvReport {
        script: script.name().to_string(),
        dependencies: deps.to_vec(),
        cache_key: cache_key(deps),
        built: path.is_dir(),
        path,
    })
}

pub fn cmd_env_path(script_path: &Path, parent: Option<PathBuf>, json: bool) -> Result<()> {
    let report = report(script_path, parent)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.path.display());
        eprintln!(
            "{} dependencies, key {}, {}",
            report.dependencies.len(),
            report.cache_key,
            if report.built { "built" } else { "not built yet" }
        );
    }
    Ok(())
}
