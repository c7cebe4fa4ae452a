//! Run context: the configuration every plugin of one run shares.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::PathsConfig;
use crate::process::{CommandRunner, SystemCommandRunner};
use crate::store::{ContentStore, LocalStore};

/// Where the script's workspace comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkspacePolicy {
    /// A fresh temporary directory per run.
    #[default]
    Temporary,
    /// This exact path; it must not exist yet.
    At(PathBuf),
}

/// Immutable per-invocation configuration, passed by reference to every plugin.
///
/// Built once with [`RunContext::new`] plus the `with_*` methods; there are no
/// setters afterwards.
#[derive(Clone)]
pub struct RunContext {
    datastore: Arc<dyn ContentStore>,
    virtualenv_parent_dir: PathBuf,
    working_directory: WorkspacePolicy,
    index_server_url: Option<String>,
    runner: Arc<dyn CommandRunner>,
}

impl RunContext {
    pub fn new(datastore: Arc<dyn ContentStore>, virtualenv_parent_dir: impl Into<PathBuf>) -> Self {
        Self {
            datastore,
            virtualenv_parent_dir: virtualenv_parent_dir.into(),
            working_directory: WorkspacePolicy::Temporary,
            index_server_url: None,
            runner: Arc::new(SystemCommandRunner),
        }
    }

    /// Context for a [`LocalStore`] datastore as configured by the environment.
    pub fn from_config(config: &PathsConfig) -> Self {
        let ctx = Self::new(
            Arc::new(LocalStore::new(&config.datastore)),
            &config.virtualenv_parent_dir,
        );
        let ctx = match config.working_directory {
            Some(ref dir) => ctx.with_working_directory(WorkspacePolicy::At(dir.clone())),
            None => ctx,
        };
        ctx.with_index_server_url(config.index_url.clone())
    }

    pub fn with_working_directory(mut self, policy: WorkspacePolicy) -> Self {
        self.working_directory = policy;
        self
    }

    pub fn with_index_server_url(mut self, url: Option<String>) -> Self {
        self.index_server_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn datastore(&self) -> &dyn ContentStore {
        self.datastore.as_ref()
    }

    pub fn virtualenv_parent_dir(&self) -> &Path {
        &self.virtualenv_parent_dir
    }

    pub fn working_directory(&self) -> &WorkspacePolicy {
        &self.working_directory
    }

    pub fn index_server_url(&self) -> Option<&str> {
        self.index_server_url.as_deref()
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("virtualenv_parent_dir", &self.virtualenv_parent_dir)
            .field("working_directory", &self.working_directory)
            .field("index_server_url", &self.index_server_url)
            .finish_non_exhaustive()
    }
}
