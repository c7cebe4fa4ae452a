//! Error taxonomy shared by the spec loader, the content store and the pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::process::CommandResult;

pub type Result<T, E = ReplayError> = std::result::Result<T, E>;

/// Every failure replay can report. All of them are fatal to a run.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Invalid script name '{0}': use letters, digits and '_', not starting with a digit")]
    InvalidScriptName(String),

    #[error("Invalid script specification {}: {reason}", path.display())]
    InvalidScriptSpec { path: PathBuf, reason: String },

    #[error("Missing input: '{0}' does not exist in the datastore")]
    MissingInput(String),

    #[error("Missing output: '{}' was not produced by the script", .0.display())]
    MissingOutput(PathBuf),

    #[error("Missing dependency: cannot install '{package}'\n{result}")]
    MissingDependency {
        package: String,
        result: CommandResult,
    },

    #[error("Script error\n{0}")]
    ScriptError(CommandResult),

    #[error("Cannot build dependency environment {}\n{result}", path.display())]
    EnvironmentBuild { path: PathBuf, result: CommandResult },

    #[error("Database command failed for '{database}'\n{result}")]
    Database {
        database: String,
        result: CommandResult,
    },

    #[error("Unknown plugin '{name}' (known: {known})")]
    UnknownPlugin { name: String, known: String },

    #[error("Invalid datastore path '{path}': {reason}")]
    InvalidStorePath { path: String, reason: String },

    #[error("Cannot run {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl ReplayError {
    /// `map_err` adapter attaching a description to an I/O failure.
    pub fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> ReplayError {
        let context = context.into();
        move |source| ReplayError::Io { context, source }
    }

    /// The captured command output behind this error, if a command caused it.
    pub fn command_result(&self) -> Option<&CommandResult> {
        match self {
            ReplayError::MissingDependency { result, .. }
            | ReplayError::EnvironmentBuild { result, .. }
            | ReplayError::Database { result, .. } => Some(result),
            ReplayError::ScriptError(result) => Some(result),
            _ => None,
        }
    }
}
