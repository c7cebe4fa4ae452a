//! Data transfer plugins: stage inputs from the datastore into the workspace
//! before the script runs, publish outputs back after it succeeded.
//!
//! Local paths are relative to the current directory, which is the workspace
//! when these plugins run inside the workspace plugin.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use replay_core::script::FileMapping;
use replay_core::store::ContentStore;
use replay_core::{ReplayError, Result, RunContext, ScriptSpec};

use crate::info_log;
use crate::plugin::{Plugin, ScopeOutcome};

pub(crate) fn build_inputs<'a>(ctx: &'a RunContext, script: &'a ScriptSpec) -> Result<Box<dyn Plugin + 'a>> {
    Ok(Box::new(Inputs::new(ctx.datastore(), script.inputs())))
}

pub(crate) fn build_outputs<'a>(ctx: &'a RunContext, script: &'a ScriptSpec) -> Result<Box<dyn Plugin + 'a>> {
    Ok(Box::new(Outputs::new(ctx.datastore(), script.outputs())))
}

/// Copies declared inputs store → workspace on enter.
pub struct Inputs<'a> {
    store: &'a dyn ContentStore,
    mappings: &'a [FileMapping],
}

impl<'a> Inputs<'a> {
    pub fn new(store: &'a dyn ContentStore, mappings: &'a [FileMapping]) -> Self {
        Self { store, mappings }
    }
}

/// Fail with the first declared input that is absent from the store.
pub fn check_inputs(store: &dyn ContentStore, mappings: &[FileMapping]) -> Result<()> {
    match mappings.iter().find(|m| !store.exists(&m.store)) {
        Some(missing) => Err(ReplayError::MissingInput(missing.store.clone())),
        None => Ok(()),
    }
}

impl Plugin for Inputs<'_> {
    fn name(&self) -> &str {
        crate::plugin::INPUTS
    }

    fn enter(&mut self) -> Result<()> {
        check_inputs(self.store, self.mappings)?;
        for mapping in self.mappings {
            download(self.store, mapping)?;
        }
        if !self.mappings.is_empty() {
            info_log!(count = self.mappings.len(), "Inputs staged");
        }
        Ok(())
    }
}

fn download(store: &dyn ContentStore, mapping: &FileMapping) -> Result<()> {
    let local = &mapping.local;
    if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(ReplayError::io(format!("Create input directory {}", parent.display())))?;
    }
    let mut reader = store.read(&mapping.store)?;
    let mut file = File::create(local)
        .map_err(ReplayError::io(format!("Create input file {}", local.display())))?;
    io::copy(&mut reader, &mut file)
        .map_err(ReplayError::io(format!("Copy {} to {}", mapping.store, local.display())))?;
    tracing::debug!(from = %mapping.store, to = %local.display(), "Input copied");
    Ok(())
}

/// Copies declared outputs workspace → store on exit.
///
/// All outputs must exist before any is copied. Nothing is published when the
/// enclosed scope failed.
pub struct Outputs<'a> {
    store: &'a dyn ContentStore,
    mappings: &'a [FileMapping],
}

impl<'a> Outputs<'a> {
    pub fn new(store: &'a dyn ContentStore, mappings: &'a [FileMapping]) -> Self {
        Self { store, mappings }
    }
}

impl Plugin for Outputs<'_> {
    fn name(&self) -> &str {
        crate::plugin::OUTPUTS
    }

    fn enter(&mut self) -> Result<()> {
        Ok(())
    }

    fn exit(&mut self, outcome: ScopeOutcome) -> Result<()> {
        if outcome == ScopeOutcome::Failed {
            tracing::debug!("Run failed, outputs not published");
            return Ok(());
        }
        if let Some(missing) = self.mappings.iter().find(|m| !m.local.is_file()) {
            return Err(ReplayError::MissingOutput(missing.local.clone()));
        }
        for mapping in self.mappings {
            upload(self.store, mapping)?;
        }
        if !self.mappings.is_empty() {
            info_log!(count = self.mappings.len(), "Outputs published");
        }
        Ok(())
    }
}

fn upload(store: &dyn ContentStore, mapping: &FileMapping) -> Result<()> {
    let local: &Path = &mapping.local;
    let mut file =
        File::open(local).map_err(ReplayError::io(format!("Open output {}", local.display())))?;
    store.write(&mapping.store, &mut file)?;
    tracing::debug!(from = %local.display(), to = %mapping.store, "Output copied");
    Ok(())
}
