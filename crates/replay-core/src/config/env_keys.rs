//! Environment variable key constants and aliases.
//!
//! Primary variables use the `REPLAY_*` prefix; aliases keep the conventions
//! of the Python tooling replay sits on top of (`WORKON_HOME`, `PIP_INDEX_URL`).

/// Datastore, cache and workspace locations
pub mod paths {
    pub const REPLAY_DATASTORE: &str = "REPLAY_DATASTORE";

    pub const REPLAY_VIRTUALENV_DIR: &str = "REPLAY_VIRTUALENV_DIR";
    /// virtualenvwrapper's home; shared so replay environments live next to the user's
    pub const VIRTUALENV_DIR_ALIASES: &[&str] = &["WORKON_HOME"];

    pub const REPLAY_WORKING_DIRECTORY: &str = "REPLAY_WORKING_DIRECTORY";

    pub const REPLAY_INDEX_URL: &str = "REPLAY_INDEX_URL";
    pub const INDEX_URL_ALIASES: &[&str] = &["PIP_INDEX_URL"];
}

/// Observability and logging
pub mod observability {
    pub const REPLAY_QUIET: &str = "REPLAY_QUIET";
    pub const REPLAY_LOG_LEVEL: &str = "REPLAY_LOG_LEVEL";
    pub const REPLAY_LOG_JSON: &str = "REPLAY_LOG_JSON";
    pub const REPLAY_AUDIT_LOG: &str = "REPLAY_AUDIT_LOG";
}

/// Variables the pipeline itself sets for the script
pub mod script_env {
    pub const PATH: &str = "PATH";
    pub const VIRTUAL_ENV: &str = "VIRTUAL_ENV";
    pub const PGDATABASE: &str = "PGDATABASE";
}

/// Login name lookup, most specific first
pub const USER: &str = "USER";
pub const USER_ALIASES: &[&str] = &["LOGNAME", "USERNAME"];
