//! Plugin contract and the static registry of known plugins.
//!
//! A plugin is one setup/teardown stage around the script: `enter` acquires a
//! resource, `exit` releases it. Plugins are built per run from a
//! [`PluginFactory`] and borrow the run's context and script.

use replay_core::{ReplayError, Result, RunContext, ScriptSpec};

use crate::{datastore, env, postgres, workspace};

/// Whether the scope enclosed by a plugin finished successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOutcome {
    Completed,
    Failed,
}

impl ScopeOutcome {
    pub fn of<T>(result: &Result<T>) -> Self {
        if result.is_ok() {
            ScopeOutcome::Completed
        } else {
            ScopeOutcome::Failed
        }
    }
}

/// One acquire/release stage of the pipeline.
pub trait Plugin {
    fn name(&self) -> &str;

    /// Acquire. On error nothing is left for `exit` to release, and `exit` is
    /// not called.
    fn enter(&mut self) -> Result<()>;

    /// Release what `enter` acquired. Called exactly once after a successful
    /// `enter`, with the outcome of everything that ran inside this scope.
    fn exit(&mut self, _outcome: ScopeOutcome) -> Result<()> {
        Ok(())
    }
}

/// Builds a fresh plugin instance for one run.
pub trait PluginFactory: Send + Sync {
    fn name(&self) -> &str;

    fn build<'a>(&self, ctx: &'a RunContext, script: &'a ScriptSpec) -> Result<Box<dyn Plugin + 'a>>;
}

type Constructor = for<'a> fn(&'a RunContext, &'a ScriptSpec) -> Result<Box<dyn Plugin + 'a>>;

/// A named constructor in the registry.
pub struct Registered {
    name: &'static str,
    ctor: Constructor,
}

impl PluginFactory for Registered {
    fn name(&self) -> &str {
        self.name
    }

    fn build<'a>(&self, ctx: &'a RunContext, script: &'a ScriptSpec) -> Result<Box<dyn Plugin + 'a>> {
        (self.ctor)(ctx, script)
    }
}

pub const WORKING_DIRECTORY: &str = "working_directory";
pub const VIRTUALENV: &str = "virtualenv";
pub const POSTGRES: &str = "postgres";
pub const INPUTS: &str = "inputs";
pub const OUTPUTS: &str = "outputs";

/// Every plugin replay knows, in default pipeline order.
static REGISTRY: [Registered; 5] = [
    Registered {
        name: WORKING_DIRECTORY,
        ctor: workspace::build,
    },
    Registered {
        name: VIRTUALENV,
        ctor: env::build,
    },
    Registered {
        name: POSTGRES,
        ctor: postgres::build,
    },
    Registered {
        name: INPUTS,
        ctor: datastore::build_inputs,
    },
    Registered {
        name: OUTPUTS,
        ctor: datastore::build_outputs,
    },
];

pub fn names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|r| r.name)
}

/// Find a plugin by name.
pub fn lookup(name: &str) -> Result<&'static dyn PluginFactory> {
    REGISTRY
        .iter()
        .find(|r| r.name == name)
        .map(|r| r as &'static dyn PluginFactory)
        .ok_or_else(|| ReplayError::UnknownPlugin {
            name: name.to_string(),
            known: names().collect::<Vec<_>>().join(", "),
        })
}

/// Resolve a list of names, failing on the first unknown one.
pub fn resolve<S: AsRef<str>>(names: &[S]) -> Result<Vec<&'static dyn PluginFactory>> {
    names.iter().map(|n| lookup(n.as_ref().trim())).collect()
}

/// The standard chain: workspace, dependency environment, database, inputs, outputs.
pub fn default_chain() -> Vec<&'static dyn PluginFactory> {
    REGISTRY.iter().map(|r| r as &'static dyn PluginFactory).collect()
}
