//! Isolated script execution for replay.
//!
//! A run nests the script inside an ordered chain of plugins (see
//! [`pipeline::run`]). The standard chain is [`plugin::default_chain`]:
//! workspace, dependency environment, ephemeral database, inputs, outputs.

pub mod datastore;
pub mod env;
pub mod log;
pub mod pipeline;
pub mod plugin;
pub mod postgres;
pub mod runner;
pub mod workspace;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use pipeline::{run, run_with};
pub use plugin::{default_chain, lookup, Plugin, PluginFactory, ScopeOutcome};
