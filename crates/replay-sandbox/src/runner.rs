//! Execution plugin: runs the script's entry file. Terminal action of the pipeline.

use std::env;

use replay_core::process::CommandSpec;
use replay_core::{ReplayError, Result, RunContext, ScriptSpec};

use crate::info_log;
use crate::plugin::Plugin;

pub struct Execution<'a> {
    ctx: &'a RunContext,
    script: &'a ScriptSpec,
}

impl<'a> Execution<'a> {
    pub fn new(ctx: &'a RunContext, script: &'a ScriptSpec) -> Self {
        Self { ctx, script }
    }

    /// `[interpreter, <script dir>/<entry>, arguments...]`, or `None` without an entry.
    pub fn command(&self) -> Option<CommandSpec> {
        let entry = self.script.entry_path()?;
        Some(
            CommandSpec::new(self.script.interpreter())
                .arg(entry)
                .args(self.script.arguments()),
        )
    }
}

impl Plugin for Execution<'_> {
    fn name(&self) -> &str {
        "execute"
    }

    fn enter(&mut self) -> Result<()> {
        let Some(command) = self.command() else {
            tracing::debug!(script = %self.script.name(), "No entry file, nothing to execute");
            return Ok(());
        };
        // Inherits cwd and environment as left by the enclosing plugins.
        let command = match env::current_dir() {
            Ok(cwd) => command.current_dir(cwd),
            Err(_) => command,
        };
        info_log!(command = %command.display(), "Executing script");
        let result = self.ctx.runner().run(&command)?;
        if !result.success() {
            return Err(ReplayError::ScriptError(result));
        }
        Ok(())
    }
}
