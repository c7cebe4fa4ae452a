//! `replay check`: validate a spec and its inputs without running anything.

use std::path::{Path, PathBuf};

use anyhow::Result;
use replay_core::config::PathsConfig;
use replay_core::store::LocalStore;
use replay_sandbox::datastore::check_inputs;

use super::{absolute, load_script};

pub fn cmd_check(script_path: &Path, datastore: Option<PathBuf>) -> Result<()> {
    let script = load_script(script_path)?;
    let root = match datastore {
        Some(dir) => absolute(&dir)?,
        None => absolute(&PathsConfig::from_env().datastore)?,
    };
    let store = LocalStore::new(&root);
    check_inputs(&store, script.inputs())?;

    eprintln!(
        "✓ {}: spec valid, {} input(s) present in {}",
        script.name(),
        script.inputs().len(),
        root.display()
    );
    Ok(())
}
