//! Content-addressed dependency environments: cache key, layout, build.

use std::fs;
use std::path::{Path, PathBuf};

use replay_core::process::{CommandRunner, CommandSpec};
use replay_core::{ReplayError, Result};
use sha2::{Digest, Sha256};

use crate::info_log;

/// Directory name prefix of every cached environment.
pub const ENV_DIR_PREFIX: &str = "_replay_";

/// Hash of the sorted, deduplicated dependency list joined by newlines.
/// Declaration order never changes the key.
pub fn cache_key<S: AsRef<str>>(dependencies: &[S]) -> String {
    let mut deps: Vec<&str> = dependencies.iter().map(|d| d.as_ref()).collect();
    deps.sort_unstable();
    deps.dedup();
    let mut hasher = Sha256::new();
    hasher.update(deps.join("\n").as_bytes());
    hex::encode(hasher.finalize())
}

/// `<parent>/_replay_<cache key>`
pub fn env_dir<S: AsRef<str>>(parent: &Path, dependencies: &[S]) -> PathBuf {
    parent.join(format!("{ENV_DIR_PREFIX}{}", cache_key(dependencies)))
}

/// Directory holding the environment's executables.
pub fn bin_dir(env_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        env_dir.join("Scripts")
    } else {
        env_dir.join("bin")
    }
}

/// Whether the environment was built by this call or found in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Built,
    Reused,
}

/// Make sure the environment at `env_dir` exists, building it if it does not.
///
/// Existence of the directory is the only completeness signal. A failed
/// environment creation removes the directory again. A failed package install
/// leaves it behind; remove it by hand before retrying.
pub fn ensure_environment(
    runner: &dyn CommandRunner,
    env_dir: &Path,
    dependencies: &[String],
    index_url: Option<&str>,
) -> Result<Provisioned> {
    if env_dir.exists() {
        info_log!(env = %env_dir.display(), "Reusing cached dependency environment");
        return Ok(Provisioned::Reused);
    }

    info_log!(env = %env_dir.display(), packages = dependencies.len(), "Building dependency environment");
    if let Some(parent) = env_dir.parent() {
        fs::create_dir_all(parent)
            .map_err(ReplayError::io(format!("Create environment parent {}", parent.display())))?;
    }

    // The creation tool makes env_dir itself; whatever it leaves behind on
    // failure must not pass for a cached environment.
    let created = match runner.run(&create_env_command(env_dir)) {
        Ok(result) => result,
        Err(e) => {
            discard_unbuilt(env_dir);
            return Err(e);
        }
    };
    if !created.success() {
        discard_unbuilt(env_dir);
        return Err(ReplayError::EnvironmentBuild {
            path: env_dir.to_path_buf(),
            result: created,
        });
    }
    if !env_dir.is_dir() {
        return Err(ReplayError::EnvironmentBuild {
            path: env_dir.to_path_buf(),
            result: created,
        });
    }

    for package in dependencies {
        let result = runner.run(&install_command(env_dir, package, index_url))?;
        if !result.success() {
            warn_partial(env_dir);
            return Err(ReplayError::MissingDependency {
                package: package.clone(),
                result,
            });
        }
        tracing::debug!(package = %package, "Installed");
    }
    Ok(Provisioned::Built)
}

/// `virtualenv <dir>` when virtualenv is installed, else `python3 -m venv <dir>`.
pub fn create_env_command(env_dir: &Path) -> CommandSpec {
    match which::which("virtualenv") {
        Ok(virtualenv) => CommandSpec::new(virtualenv).arg(env_dir),
        Err(_) => CommandSpec::new(which_python())
            .arg("-m")
            .arg("venv")
            .arg(env_dir),
    }
}

/// `<bin>/pip install [--index-url=URL] <package>`
pub fn install_command(env_dir: &Path, package: &str, index_url: Option<&str>) -> CommandSpec {
    let pip = bin_dir(env_dir).join(if cfg!(windows) { "pip.exe" } else { "pip" });
    let mut cmd = CommandSpec::new(pip).arg("install");
    if let Some(url) = index_url {
        cmd = cmd.arg(format!("--index-url={url}"));
    }
    cmd.arg(package)
}

fn which_python() -> PathBuf {
    ["python3", "python"]
        .iter()
        .find_map(|name| which::which(name).ok())
        .unwrap_or_else(|| PathBuf::from("python3"))
}

fn discard_unbuilt(env_dir: &Path) {
    if !env_dir.exists() {
        return;
    }
    if let Err(e) = fs::remove_dir_all(env_dir) {
        tracing::warn!(env = %env_dir.display(), error = %e, "Could not remove failed environment");
    }
}

fn warn_partial(env_dir: &Path) {
    tracing::warn!(
        env = %env_dir.display(),
        "Dependency environment left incomplete; delete it before the next run"
    );
}
