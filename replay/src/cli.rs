use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// replay - run scripts reproducibly in disposable, dependency-pinned environments
#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a script in a fresh workspace with its inputs, dependencies and database
    Run(RunArgs),

    /// Validate a script spec and check that all declared inputs are in the datastore
    Check {
        /// Path to the script spec file
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Datastore directory (default: $REPLAY_DATASTORE or the current directory)
        #[arg(long, value_name = "DIR")]
        datastore: Option<PathBuf>,
    },

    /// Show the cached dependency environment a script resolves to
    EnvPath {
        /// Path to the script spec file
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Parent directory of cached environments
        #[arg(long, value_name = "DIR")]
        virtualenv_parent_directory: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// List the available plugins in default pipeline order
    Plugins,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the script spec file
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Datastore directory (default: $REPLAY_DATASTORE or the current directory)
    #[arg(long, value_name = "DIR")]
    pub datastore: Option<PathBuf>,

    /// Run in this directory instead of a temporary one; it must not exist yet
    #[arg(long, value_name = "DIR")]
    pub script_working_directory: Option<PathBuf>,

    /// Parent directory of cached environments (default: $REPLAY_VIRTUALENV_DIR, $WORKON_HOME or ~/.virtualenvs)
    #[arg(long, value_name = "DIR")]
    pub virtualenv_parent_directory: Option<PathBuf>,

    /// Package index base URL passed to every install
    #[arg(long, value_name = "URL", env = "REPLAY_INDEX_URL")]
    pub index_url: Option<String>,

    /// Comma-separated plugin chain (default: every plugin, see `replay plugins`)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub plugins: Option<Vec<String>>,
}
