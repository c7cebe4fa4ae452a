//! Configuration structs grouped by concern, loaded from the environment.

use super::env_keys::{observability as obv_keys, paths as path_keys};
use super::loader::{env_bool, env_optional, env_or, load_dotenv};
use std::path::PathBuf;

/// Datastore, dependency cache, workspace and package index settings.
///
/// CLI flags take precedence over these values; see `replay::commands`.
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub datastore: PathBuf,
    pub virtualenv_parent_dir: PathBuf,
    /// `None` means "allocate a fresh temporary directory per run"
    pub working_directory: Option<PathBuf>,
    pub index_url: Option<String>,
}

impl PathsConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let datastore = env_optional(path_keys::REPLAY_DATASTORE, &[])
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let working_directory =
            env_optional(path_keys::REPLAY_WORKING_DIRECTORY, &[]).map(PathBuf::from);

        let index_url = env_optional(path_keys::REPLAY_INDEX_URL, path_keys::INDEX_URL_ALIASES);

        Self {
            datastore,
            virtualenv_parent_dir: default_virtualenv_parent_dir(),
            working_directory,
            index_url,
        }
    }
}

/// `$REPLAY_VIRTUALENV_DIR`, then `$WORKON_HOME`, then `~/.virtualenvs`.
pub fn default_virtualenv_parent_dir() -> PathBuf {
    if let Some(dir) = env_optional(
        path_keys::REPLAY_VIRTUALENV_DIR,
        path_keys::VIRTUALENV_DIR_ALIASES,
    ) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".virtualenvs")
}

/// Observability: quiet, log level, JSON output, audit log path
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            load_dotenv();
            Self {
                quiet: env_bool(obv_keys::REPLAY_QUIET, &[], false),
                log_level: env_or(obv_keys::REPLAY_LOG_LEVEL, &[], || "replay=info".to_string()),
                log_json: env_bool(obv_keys::REPLAY_LOG_JSON, &[], false),
                audit_log: env_optional(obv_keys::REPLAY_AUDIT_LOG, &[]),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::{remove_env_var, set_env_var};

    #[test]
    fn test_virtualenv_parent_dir_precedence() {
        // Only this test touches these keys.
        set_env_var(path_keys::REPLAY_VIRTUALENV_DIR, "/replay/envs");
        set_env_var("WORKON_HOME", "/virtualenvs");
        assert_eq!(default_virtualenv_parent_dir(), PathBuf::from("/replay/envs"));

        remove_env_var(path_keys::REPLAY_VIRTUALENV_DIR);
        assert_eq!(default_virtualenv_parent_dir(), PathBuf::from("/virtualenvs"));

        remove_env_var("WORKON_HOME");
        let dir = default_virtualenv_parent_dir();
        assert!(dir.ends_with(".virtualenvs"));
    }
}
