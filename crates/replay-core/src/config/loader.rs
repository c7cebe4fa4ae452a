//! Unified environment variable loading.
//!
//! Keeps the alias fallback chains in one place, and owns every mutation of the
//! process environment (`set_env_var`, `remove_env_var`, [`ScopedEnvGuard`]).

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::Path;

/// Load `.env` from the current directory into the process environment
/// (never overrides variables that are already set). Runs once per process.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let dir = env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
        load_dotenv_from_dir(&dir);
    });
}

/// Load `<dir>/.env` into the process environment without overriding set variables.
pub fn load_dotenv_from_dir(dir: &Path) {
    let Ok(content) = std::fs::read_to_string(dir.join(".env")) else {
        return;
    };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(eq_pos) = line.find('=') else {
            continue;
        };
        let key = line[..eq_pos].trim();
        let mut value = line[eq_pos + 1..].trim();
        // Strip inline comment (# not inside quotes)
        if let Some(hash_pos) = value.find('#') {
            let before_hash = value[..hash_pos].trim_end();
            if !before_hash.contains('"') && !before_hash.contains('\'') {
                value = before_hash;
            }
        }
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        if !key.is_empty() && env::var_os(key).is_none() {
            set_env_var(key, value);
        }
    }
}

/// Read the primary variable or the first set alias; fall back to `default`.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// Read the primary variable or an alias; empty values count as unset.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Parse a boolean variable: anything but 0/false/no/off counts as true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

// ─── Centralised env::set_var / remove_var wrappers ──────────────────────────
//
// Every write to the process environment goes through the functions below.
//
// SAFETY contract: replay runs one pipeline on one thread; callers must not
// mutate the environment while other threads read it.

/// Set a single environment variable.
#[allow(unsafe_code, unused_unsafe)]
pub fn set_env_var<K: AsRef<OsStr>, V: AsRef<OsStr>>(key: K, value: V) {
    unsafe { env::set_var(key, value) };
}

/// Remove a single environment variable.
#[allow(unsafe_code, unused_unsafe)]
pub fn remove_env_var<K: AsRef<OsStr>>(key: K) {
    unsafe { env::remove_var(key) };
}

/// Presence and value of one environment variable at the moment of capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSnapshot {
    key: String,
    value: Option<OsString>,
}

impl EnvSnapshot {
    pub fn capture(key: &str) -> Self {
        Self {
            key: key.to_string(),
            value: env::var_os(key),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value at capture time; `None` means the variable was absent.
    pub fn value(&self) -> Option<&OsStr> {
        self.value.as_deref()
    }

    /// Put the variable back exactly as captured, deleting it if it was absent.
    pub fn restore(&self) {
        match &self.value {
            Some(value) => set_env_var(&self.key, value),
            None => remove_env_var(&self.key),
        }
    }
}

/// RAII guard: snapshots a variable before it is changed and restores the
/// snapshot on [`ScopedEnvGuard::restore`] or drop, whichever comes first.
///
/// Plugins hold one guard per variable they touch and release them in reverse
/// order of acquisition.
#[derive(Debug)]
pub struct ScopedEnvGuard {
    snapshot: EnvSnapshot,
    restored: bool,
}

impl ScopedEnvGuard {
    /// Snapshot `key` without changing it.
    pub fn capture(key: &str) -> Self {
        Self {
            snapshot: EnvSnapshot::capture(key),
            restored: false,
        }
    }

    /// Snapshot `key`, then set it to `value`.
    pub fn set<V: AsRef<OsStr>>(key: &str, value: V) -> Self {
        let guard = Self::capture(key);
        set_env_var(key, value);
        guard
    }

    /// Snapshot `key`, then remove it.
    pub fn remove(key: &str) -> Self {
        let guard = Self::capture(key);
        remove_env_var(key);
        guard
    }

    pub fn snapshot(&self) -> &EnvSnapshot {
        &self.snapshot
    }

    /// Restore the captured state now.
    pub fn restore(mut self) {
        self.restore_in_place();
    }

    fn restore_in_place(&mut self) {
        if !self.restored {
            self.snapshot.restore();
            self.restored = true;
        }
    }
}

impl Drop for ScopedEnvGuard {
    fn drop(&mut self) {
        self.restore_in_place();
    }
}
