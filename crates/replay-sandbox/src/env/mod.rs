//! Dependency environment plugin.
//!
//! Resolves the script's dependency list to a cached environment under the
//! context's virtualenv parent directory, building it on first use, and puts
//! the environment's executables first on `PATH` for the rest of the run.

pub mod builder;

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use replay_core::config::env_keys::script_env;
use replay_core::config::ScopedEnvGuard;
use replay_core::{ReplayError, Result, RunContext, ScriptSpec};

use crate::plugin::{Plugin, ScopeOutcome};

pub use builder::{bin_dir, cache_key, ensure_environment, env_dir, Provisioned};

pub(crate) fn build<'a>(ctx: &'a RunContext, script: &'a ScriptSpec) -> Result<Box<dyn Plugin + 'a>> {
    Ok(Box::new(DependencyEnvironment::new(ctx, script)))
}

pub struct DependencyEnvironment<'a> {
    ctx: &'a RunContext,
    script: &'a ScriptSpec,
    /// Acquisition order; released last to first.
    guards: Vec<ScopedEnvGuard>,
}

impl<'a> DependencyEnvironment<'a> {
    pub fn new(ctx: &'a RunContext, script: &'a ScriptSpec) -> Self {
        Self {
            ctx,
            script,
            guards: Vec::new(),
        }
    }

    pub fn env_dir(&self) -> PathBuf {
        env_dir(self.ctx.virtualenv_parent_dir(), self.script.python_dependencies())
    }
}

/// `dir` followed by the entries of the current `PATH`.
fn prepend_to_path(dir: PathBuf) -> Result<OsString> {
    let mut entries = vec![dir];
    if let Some(current) = env::var_os(script_env::PATH) {
        entries.extend(env::split_paths(&current));
    }
    env::join_paths(entries).map_err(|e| ReplayError::Io {
        context: "Extend PATH".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
    })
}

impl Plugin for DependencyEnvironment<'_> {
    fn name(&self) -> &str {
        crate::plugin::VIRTUALENV
    }

    fn enter(&mut self) -> Result<()> {
        let dir = self.env_dir();
        ensure_environment(
            self.ctx.runner(),
            &dir,
            self.script.python_dependencies(),
            self.ctx.index_server_url(),
        )?;

        let path = prepend_to_path(bin_dir(&dir))?;
        self.guards.push(ScopedEnvGuard::set(script_env::PATH, path));
        self.guards.push(ScopedEnvGuard::set(script_env::VIRTUAL_ENV, &dir));
        tracing::debug!(env = %dir.display(), "Dependency environment active");
        Ok(())
    }

    fn exit(&mut self, _outcome: ScopeOutcome) -> Result<()> {
        while let Some(guard) = self.guards.pop() {
            guard.restore();
        }
        Ok(())
    }
}
