//! Pipeline executor: nests an ordered list of plugins around the script run.
//!
//! Plugins are entered in list order and kept on an explicit scope stack.
//! Whatever happens afterwards, every entered plugin is exited exactly once,
//! last entered first. A plugin whose construction or `enter` fails is never
//! exited and nothing after it is entered.
//!
//! When the run has already failed, that error is the result and teardown
//! errors are only logged. When the run succeeded, the first teardown error
//! becomes the result; the remaining teardowns still run.

use std::time::Instant;

use replay_core::observability;
use replay_core::{Result, RunContext, ScriptSpec};

use crate::info_log;
use crate::plugin::{Plugin, PluginFactory, ScopeOutcome};
use crate::runner::Execution;

/// Run `script` inside `plugins`, with script execution as the terminal action.
pub fn run(plugins: &[&dyn PluginFactory], ctx: &RunContext, script: &ScriptSpec) -> Result<()> {
    run_with(plugins, ctx, script, || Execution::new(ctx, script).enter())
}

/// Run `terminal` inside `plugins`.
pub fn run_with<F>(
    plugins: &[&dyn PluginFactory],
    ctx: &RunContext,
    script: &ScriptSpec,
    terminal: F,
) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    let names: Vec<&str> = plugins.iter().map(|p| p.name()).collect();
    observability::audit_pipeline_started(script.name(), &names);
    let start = Instant::now();

    let mut stack = ScopeStack::default();
    let result = stack.enter_all(plugins, ctx, script).and_then(|()| terminal());
    let result = stack.unwind(result);

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(()) => info_log!(script = %script.name(), duration_ms, "Script completed"),
        Err(e) => tracing::error!(script = %script.name(), duration_ms, error = %e, "Script failed"),
    }
    observability::audit_pipeline_completed(
        script.name(),
        result.is_ok(),
        duration_ms,
        result.as_ref().err().map(|e| e.to_string()).as_deref(),
    );
    result
}

/// Entered plugins, innermost last.
#[derive(Default)]
struct ScopeStack<'a> {
    entered: Vec<Box<dyn Plugin + 'a>>,
}

impl<'a> ScopeStack<'a> {
    fn enter_all(
        &mut self,
        plugins: &[&dyn PluginFactory],
        ctx: &'a RunContext,
        script: &'a ScriptSpec,
    ) -> Result<()> {
        for factory in plugins {
            let mut plugin = factory.build(ctx, script)?;
            tracing::debug!(plugin = plugin.name(), "Entering plugin");
            plugin.enter()?;
            self.entered.push(plugin);
        }
        Ok(())
    }

    /// Exit every entered plugin, innermost first, folding teardown errors into `result`.
    fn unwind(&mut self, mut result: Result<()>) -> Result<()> {
        while let Some(mut plugin) = self.entered.pop() {
            let outcome = ScopeOutcome::of(&result);
            tracing::debug!(plugin = plugin.name(), ?outcome, "Exiting plugin");
            if let Err(e) = plugin.exit(outcome) {
                if result.is_ok() {
                    result = Err(e);
                } else {
                    tracing::error!(
                        plugin = plugin.name(),
                        error = %e,
                        "Teardown failed after an earlier error"
                    );
                }
            }
        }
        result
    }
}

impl Drop for ScopeStack<'_> {
    fn drop(&mut self) {
        // Only reached with scopes still held when unwinding from a panic.
        while let Some(mut plugin) = self.entered.pop() {
            if let Err(e) = plugin.exit(ScopeOutcome::Failed) {
                tracing::error!(plugin = plugin.name(), error = %e, "Teardown failed during panic");
            }
        }
    }
}
