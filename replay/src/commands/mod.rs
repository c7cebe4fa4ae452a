//! Command handlers. Each resolves CLI flags against the environment config
//! (flags win) and hands off to the sandbox crate.

pub mod check;
pub mod env_path;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use replay_core::ScriptSpec;

/// `replay plugins`
pub fn cmd_plugins() {
    for name in replay_sandbox::plugin::names() {
        println!("{name}");
    }
}

fn load_script(path: &Path) -> Result<ScriptSpec> {
    ScriptSpec::from_file(path).with_context(|| format!("Loading script {}", path.display()))
}

/// Anchor `path` at the current directory. The pipeline changes directory, so
/// every path in the run context must be absolute before it starts.
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Reading current directory")?;
    Ok(cwd.join(path))
}
